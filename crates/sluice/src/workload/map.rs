use crate::common::Map;
use crate::common::ids::{JobId, ObjectRef, WorkloadId};
use crate::workload::Workload;

/// Container of all live workloads with lookups by job id and by the
/// user-facing (namespace, name) key.
#[derive(Default)]
pub struct WorkloadMap {
    workloads: Map<WorkloadId, Workload>,
    by_job: Map<JobId, WorkloadId>,
    by_key: Map<ObjectRef, WorkloadId>,
}

impl WorkloadMap {
    pub fn insert(&mut self, workload: Workload) {
        let id = workload.id;
        assert!(self.by_job.insert(workload.job, id).is_none());
        assert!(self.by_key.insert(workload.key().clone(), id).is_none());
        assert!(self.workloads.insert(id, workload).is_none());
    }

    pub fn remove(&mut self, id: WorkloadId) -> Option<Workload> {
        let workload = self.workloads.remove(&id)?;
        self.by_job.remove(&workload.job);
        self.by_key.remove(workload.key());
        Some(workload)
    }

    #[inline]
    pub fn get(&self, id: WorkloadId) -> Option<&Workload> {
        self.workloads.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: WorkloadId) -> Option<&mut Workload> {
        self.workloads.get_mut(&id)
    }

    #[inline]
    pub fn find_by_job(&self, job: JobId) -> Option<WorkloadId> {
        self.by_job.get(&job).copied()
    }

    #[inline]
    pub fn find_by_key(&self, key: &ObjectRef) -> Option<WorkloadId> {
        self.by_key.get(key).copied()
    }

    #[inline]
    pub fn workloads(&self) -> impl Iterator<Item = &Workload> {
        self.workloads.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}
