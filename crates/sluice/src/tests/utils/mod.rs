use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

use crate::bridge::{JobControl, JobStore};
use crate::common::ids::{JobId, ObjectRef, WorkloadId};
use crate::engine::comm::Comm;
use crate::engine::core::Core;
use crate::engine::events::EngineEvent;
use crate::engine::reactor::{self, QuotaInput};
use crate::resources::ResourceAmount;
use crate::scheduler::{BackoffPolicy, run_admission_pass};
use crate::workload::Workload;

/// Comm capturing effects for assertions.
#[derive(Default)]
pub struct TestComm {
    pub suspend_writes: Vec<(JobId, bool)>,
    pub events: Vec<EngineEvent>,
}

impl TestComm {
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Comm for TestComm {
    fn set_suspended(&mut self, job: JobId, suspended: bool) {
        self.suspend_writes.push((job, suspended));
    }

    fn emit(&mut self, event: EngineEvent) {
        self.events.push(event);
    }
}

/// Synchronous harness driving the reactor directly, with virtual time for
/// backoff checks and an in-process job store receiving suspend writes.
pub struct TestEnv {
    pub core: Core,
    pub comm: TestComm,
    pub store: JobStore,
    policy: BackoffPolicy,
    now: Instant,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> TestEnv {
        let _ = env_logger::builder().is_test(true).try_init();
        TestEnv {
            core: Default::default(),
            comm: Default::default(),
            store: JobStore::new(),
            policy: BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(60)),
            now: Instant::now(),
        }
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }

    pub fn register_flavor(&mut self, name: &str) {
        reactor::on_flavor_upsert(&mut self.core, name);
    }

    /// Configures a cluster queue from (resource, flavor, quantity) triples;
    /// flavor preference order is the listing order per resource.
    pub fn configure_queue(&mut self, name: &str, quotas: &[(&str, &str, &str)]) -> crate::Result<()> {
        let mut inputs: Vec<QuotaInput> = Vec::new();
        for &(resource, flavor, quantity) in quotas {
            let amount: ResourceAmount = quantity.parse()?;
            match inputs.iter_mut().find(|i| i.resource == resource) {
                Some(input) => input.flavors.push((flavor.to_string(), amount)),
                None => inputs.push(QuotaInput {
                    resource: resource.to_string(),
                    flavors: vec![(flavor.to_string(), amount)],
                }),
            }
        }
        reactor::on_cluster_queue_upsert(&mut self.core, &mut self.comm, name, inputs)
    }

    pub fn bind_local_queue(&mut self, namespace: &str, name: &str, cluster_queue: &str) {
        reactor::on_local_queue_upsert(
            &mut self.core,
            &ObjectRef::new(namespace, name),
            cluster_queue,
        );
    }

    /// Submits a job through the store and feeds it to the reactor.
    pub fn submit_job(
        &mut self,
        namespace: &str,
        name: &str,
        queue: Option<&str>,
        resources: &[(&str, &str)],
    ) -> (JobId, Option<WorkloadId>) {
        let resources = resources
            .iter()
            .map(|&(resource, quantity)| {
                (resource.to_string(), quantity.parse::<ResourceAmount>().unwrap())
            })
            .collect();
        let submission = self.store.insert_job(namespace, name, queue, resources);
        let job = submission.job;
        let wall = self.wall();
        let workload = reactor::on_job_created(&mut self.core, &mut self.comm, submission, wall);
        self.flush_suspend_writes();
        (job, workload)
    }

    pub fn run_pass(&mut self) {
        let wall = self.wall();
        run_admission_pass(&mut self.core, &mut self.comm, &self.policy, self.now, wall);
        self.flush_suspend_writes();
    }

    pub fn finish_job(&mut self, job: JobId) {
        let wall = self.wall();
        reactor::on_job_finished(&mut self.core, &mut self.comm, job, wall);
        self.flush_suspend_writes();
    }

    pub fn remove_job(&mut self, job: JobId) {
        reactor::on_job_removed(&mut self.core, &mut self.comm, job);
        self.store.remove_job(job);
        self.flush_suspend_writes();
    }

    /// Applies buffered suspend writes to the store, standing in for the
    /// bridge (delivery failures are exercised separately).
    fn flush_suspend_writes(&mut self) {
        for (job, suspended) in std::mem::take(&mut self.comm.suspend_writes) {
            let _ = self.store.set_suspended(job, suspended);
        }
    }

    pub fn workload(&self, id: WorkloadId) -> &Workload {
        self.core.workloads().get(id).unwrap()
    }

    pub fn assert_pending(&self, id: WorkloadId) {
        assert!(self.workload(id).is_pending(), "workload {id} is not pending");
    }

    pub fn assert_admitted(&self, id: WorkloadId) {
        assert!(self.workload(id).is_admitted(), "workload {id} is not admitted");
    }

    pub fn total_reserved(&self, queue: &str) -> ResourceAmount {
        self.core.get_cluster_queue(queue).unwrap().total_reserved()
    }
}
