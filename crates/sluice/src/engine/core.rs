use std::collections::BTreeSet;

use crate::common::ids::{JobId, ObjectRef, WorkloadId};
use crate::common::{Map, WrappedRcRefCell};
use crate::queue::{ClusterQueue, LocalQueue};
use crate::resources::{FlavorRegistry, ResourceNames};
use crate::workload::WorkloadMap;

/// Central state of the admission engine: the flavor registry, both queue
/// maps, all live workloads and the pending set.
///
/// All mutation happens on the single engine task, so a cluster queue is an
/// exclusive-access domain without any locking.
#[derive(Default)]
pub struct Core {
    flavors: FlavorRegistry,
    resource_names: ResourceNames,
    cluster_queues: Map<String, ClusterQueue>,
    local_queues: Map<ObjectRef, LocalQueue>,
    workloads: WorkloadMap,

    /// Pending workloads in FIFO order; ids are assigned monotonically at
    /// creation, so iteration order is submission order.
    pending: BTreeSet<WorkloadId>,

    workload_id_counter: u32,
    reservation_id_counter: u64,
}

pub type CoreRef = WrappedRcRefCell<Core>;

pub(crate) struct CoreSplitMut<'a> {
    pub flavors: &'a mut FlavorRegistry,
    pub resource_names: &'a mut ResourceNames,
    pub cluster_queues: &'a mut Map<String, ClusterQueue>,
    pub local_queues: &'a mut Map<ObjectRef, LocalQueue>,
    pub workloads: &'a mut WorkloadMap,
    pub pending: &'a mut BTreeSet<WorkloadId>,
    pub reservation_counter: &'a mut u64,
}

impl Core {
    #[inline]
    pub(crate) fn split_mut(&mut self) -> CoreSplitMut<'_> {
        CoreSplitMut {
            flavors: &mut self.flavors,
            resource_names: &mut self.resource_names,
            cluster_queues: &mut self.cluster_queues,
            local_queues: &mut self.local_queues,
            workloads: &mut self.workloads,
            pending: &mut self.pending,
            reservation_counter: &mut self.reservation_id_counter,
        }
    }

    pub fn new_workload_id(&mut self) -> WorkloadId {
        self.workload_id_counter += 1;
        WorkloadId::new(self.workload_id_counter)
    }

    #[inline]
    pub fn flavors(&self) -> &FlavorRegistry {
        &self.flavors
    }

    #[inline]
    pub fn flavors_mut(&mut self) -> &mut FlavorRegistry {
        &mut self.flavors
    }

    #[inline]
    pub fn resource_names(&self) -> &ResourceNames {
        &self.resource_names
    }

    #[inline]
    pub fn resource_names_mut(&mut self) -> &mut ResourceNames {
        &mut self.resource_names
    }

    #[inline]
    pub fn get_cluster_queue(&self, name: &str) -> Option<&ClusterQueue> {
        self.cluster_queues.get(name)
    }

    #[inline]
    pub fn get_cluster_queue_mut(&mut self, name: &str) -> Option<&mut ClusterQueue> {
        self.cluster_queues.get_mut(name)
    }

    pub fn add_cluster_queue(&mut self, queue: ClusterQueue) {
        assert!(
            self.cluster_queues
                .insert(queue.name().to_string(), queue)
                .is_none()
        );
    }

    pub fn remove_cluster_queue(&mut self, name: &str) -> Option<ClusterQueue> {
        self.cluster_queues.remove(name)
    }

    #[inline]
    pub fn get_local_queue(&self, key: &ObjectRef) -> Option<&LocalQueue> {
        self.local_queues.get(key)
    }

    pub fn get_or_create_local_queue(&mut self, key: &ObjectRef) -> &mut LocalQueue {
        self.local_queues
            .entry(key.clone())
            .or_insert_with(|| LocalQueue::new(key.clone()))
    }

    pub fn remove_local_queue(&mut self, key: &ObjectRef) -> Option<LocalQueue> {
        self.local_queues.remove(key)
    }

    #[inline]
    pub fn workloads(&self) -> &WorkloadMap {
        &self.workloads
    }

    #[inline]
    pub fn workloads_mut(&mut self) -> &mut WorkloadMap {
        &mut self.workloads
    }

    #[inline]
    pub fn find_workload_by_job(&self, job: JobId) -> Option<WorkloadId> {
        self.workloads.find_by_job(job)
    }

    pub fn add_pending(&mut self, id: WorkloadId) {
        assert!(self.pending.insert(id));
    }

    pub fn remove_pending(&mut self, id: WorkloadId) -> bool {
        self.pending.remove(&id)
    }

    #[inline]
    pub fn pending(&self) -> &BTreeSet<WorkloadId> {
        &self.pending
    }

    pub fn dump(&self) -> serde_json::Value {
        serde_json::json!({
            "cluster_queues": self
                .cluster_queues
                .values()
                .map(|q| q.dump(&self.resource_names, &self.flavors))
                .collect::<Vec<_>>(),
            "workloads": self
                .workloads
                .workloads()
                .map(|w| w.dump())
                .collect::<Vec<_>>(),
        })
    }
}
