use crate::define_wrapped_type;
use crate::{Error, Map};

use crate::bridge::JobControl;
use crate::common::ids::{JobId, ObjectRef};
use crate::engine::reactor::JobSubmission;
use crate::resources::ResourceAmount;

/// One external job as the store sees it: identity, the queue annotation,
/// requested resources and the suspend flag the bridge toggles.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job: JobId,
    pub key: ObjectRef,
    pub queue_name: Option<String>,
    pub resources: Vec<(String, ResourceAmount)>,
    pub suspended: Option<bool>,
}

#[derive(Default)]
pub struct JobStoreInner {
    jobs: Map<JobId, JobRecord>,
    job_id_counter: u32,
    fail_deliveries: bool,
}

define_wrapped_type!(JobStore, JobStoreInner, pub);

/// In-process stand-in for the persistence layer holding job objects.
/// Implements [`JobControl`] so the bridge can write suspend flags, and can
/// be told to fail those writes to exercise delivery retries.
impl JobStore {
    pub fn new() -> Self {
        Self(crate::common::WrappedRcRefCell::wrap(Default::default()))
    }

    /// Creates a job record and returns the submission the engine should be
    /// fed with.
    pub fn insert_job(
        &self,
        namespace: &str,
        name: &str,
        queue_name: Option<&str>,
        resources: Vec<(String, ResourceAmount)>,
    ) -> JobSubmission {
        let mut inner = self.get_mut();
        inner.job_id_counter += 1;
        let job = JobId::new(inner.job_id_counter);
        let record = JobRecord {
            job,
            key: ObjectRef::new(namespace, name),
            queue_name: queue_name.map(|q| q.to_string()),
            resources: resources.clone(),
            suspended: None,
        };
        inner.jobs.insert(job, record);
        JobSubmission {
            job,
            key: ObjectRef::new(namespace, name),
            queue_name: queue_name.map(|q| q.to_string()),
            resources,
        }
    }

    pub fn remove_job(&self, job: JobId) {
        self.get_mut().jobs.remove(&job);
    }

    /// Suspend flag of the job; `None` when the flag was never written.
    pub fn is_suspended(&self, job: JobId) -> Option<bool> {
        self.get().jobs.get(&job).and_then(|record| record.suspended)
    }

    pub fn set_fail_deliveries(&self, fail: bool) {
        self.get_mut().fail_deliveries = fail;
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobControl for JobStore {
    fn set_suspended(&self, job: JobId, suspended: bool) -> crate::Result<()> {
        let mut inner = self.get_mut();
        if inner.fail_deliveries {
            return Err(Error::Delivery(job));
        }
        match inner.jobs.get_mut(&job) {
            Some(record) => {
                record.suspended = Some(suspended);
                Ok(())
            }
            None => Err(Error::Delivery(job)),
        }
    }
}
