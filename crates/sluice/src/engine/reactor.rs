use chrono::{DateTime, Utc};
use smallvec::SmallVec;

use crate::Error;
use crate::common::ids::{FlavorId, JobId, ObjectRef, WorkloadId};
use crate::engine::comm::Comm;
use crate::engine::core::Core;
use crate::engine::events::EngineEvent;
use crate::queue::{ClusterQueue, QuotaSpec};
use crate::resources::{ResourceAmount, ResourceRequest, ResourceRequestEntry};
use crate::scheduler::wake_queue_waiters;
use crate::workload::{ConditionKind, Workload, WorkloadState, reason};

/// A submitted job as seen by the admission engine: identity, the optional
/// queue-name annotation and resource requests by name.
#[derive(Debug, Clone)]
pub struct JobSubmission {
    pub job: JobId,
    pub key: ObjectRef,
    pub queue_name: Option<String>,
    pub resources: Vec<(String, ResourceAmount)>,
}

/// Quota configuration for one resource of a cluster queue, by name.
/// Flavor order is selection-preference order.
#[derive(Debug, Clone)]
pub struct QuotaInput {
    pub resource: String,
    pub flavors: Vec<(String, ResourceAmount)>,
}

/// Reacts to a newly submitted job. Jobs without a queue annotation are
/// ignored entirely; annotated jobs are suspended and get a pending
/// workload. Returns the workload id if one was created.
pub fn on_job_created(
    core: &mut Core,
    comm: &mut impl Comm,
    submission: JobSubmission,
    now: DateTime<Utc>,
) -> Option<WorkloadId> {
    let Some(queue_name) = submission.queue_name else {
        log::debug!(
            "Job {} ({}) carries no queue annotation, leaving it alone",
            submission.job,
            submission.key
        );
        return None;
    };
    if core.find_workload_by_job(submission.job).is_some() {
        log::debug!("Job {} already has a workload", submission.job);
        return None;
    }

    // The job must not start before it is admitted
    comm.set_suspended(submission.job, true);

    let entries: SmallVec<_> = submission
        .resources
        .iter()
        .map(|(name, amount)| ResourceRequestEntry {
            resource_id: core.resource_names_mut().get_or_allocate_id(name),
            amount: *amount,
        })
        .collect();
    let request = ResourceRequest::new(entries);

    let id = core.new_workload_id();
    let queue = ObjectRef::new(submission.key.namespace(), &queue_name);
    let mut workload = Workload::new(id, submission.key.clone(), submission.job, queue, request, now);

    let valid = match workload.request.validate() {
        Ok(()) => true,
        Err(error) => {
            log::warn!("Workload {id} has an invalid resource request: {error}");
            workload.set_condition(
                ConditionKind::Admitted,
                false,
                reason::INVALID_REQUEST,
                error.to_string(),
                now,
            );
            false
        }
    };
    comm.emit(EngineEvent::WorkloadCreated {
        workload: id,
        key: submission.key,
    });
    core.workloads_mut().insert(workload);
    if valid {
        core.add_pending(id);
    }
    Some(id)
}

/// Reacts to successful completion of a job. Marks the workload finished
/// and returns its reserved capacity to the cluster queue.
///
/// A completion event racing ahead of admission drops the workload: it
/// holds no reservation and must never be admitted afterwards, since no
/// further finish event will arrive for it.
pub fn on_job_finished(core: &mut Core, comm: &mut impl Comm, job: JobId, now: DateTime<Utc>) {
    let Some(id) = core.find_workload_by_job(job) else {
        log::debug!("Finished job {job} has no workload");
        return;
    };
    if core.workloads().get(id).unwrap().is_pending() {
        log::warn!("Job {job} finished but workload {id} was never admitted, dropping it");
        core.remove_pending(id);
        core.workloads_mut().remove(id);
        comm.emit(EngineEvent::WorkloadRemoved { workload: id });
        return;
    }
    let workload = core.workloads_mut().get_mut(id).unwrap();
    if workload.is_finished() {
        log::debug!("Job {job} is already finished");
        return;
    }
    let state = std::mem::replace(&mut workload.state, WorkloadState::Finished);
    workload.set_condition(
        ConditionKind::Finished,
        true,
        reason::JOB_FINISHED,
        "Job finished successfully".to_string(),
        now,
    );
    comm.emit(EngineEvent::WorkloadFinished { workload: id });

    let WorkloadState::Admitted {
        cluster_queue,
        mut reservation,
    } = state
    else {
        unreachable!();
    };
    release_reservation(core, comm, id, &cluster_queue, &mut reservation);
}

/// Reacts to deletion of a job. A pending workload is simply dropped; an
/// admitted one releases its reservation immediately.
pub fn on_job_removed(core: &mut Core, comm: &mut impl Comm, job: JobId) {
    let Some(id) = core.find_workload_by_job(job) else {
        return;
    };
    core.remove_pending(id);
    let workload = core.workloads_mut().remove(id).unwrap();
    log::debug!("Workload {id} removed together with job {job}");
    comm.emit(EngineEvent::WorkloadRemoved { workload: id });
    if let WorkloadState::Admitted {
        cluster_queue,
        mut reservation,
    } = workload.state
    {
        release_reservation(core, comm, id, &cluster_queue, &mut reservation);
    }
}

fn release_reservation(
    core: &mut Core,
    comm: &mut impl Comm,
    workload: WorkloadId,
    cluster_queue: &str,
    reservation: &mut crate::queue::Reservation,
) {
    match core.get_cluster_queue_mut(cluster_queue) {
        Some(queue) => {
            queue.clear_used(reservation);
            queue.release(reservation);
        }
        None => {
            log::warn!(
                "Cluster queue {cluster_queue} is gone, reservation {} dropped",
                reservation.id()
            );
        }
    }
    comm.emit(EngineEvent::ReservationReleased {
        workload,
        cluster_queue: cluster_queue.to_string(),
    });
    // Freed capacity; waiters on this queue should be retried right away
    wake_queue_waiters(core, cluster_queue);
}

pub fn on_flavor_upsert(core: &mut Core, name: &str) -> FlavorId {
    core.flavors_mut().register(name)
}

pub fn on_flavor_removed(core: &mut Core, name: &str) -> crate::Result<()> {
    core.flavors_mut().remove(name)
}

/// Creates or reconfigures a cluster queue. Resource and flavor names are
/// resolved here; an unregistered flavor rejects the whole configuration.
pub fn on_cluster_queue_upsert(
    core: &mut Core,
    comm: &mut impl Comm,
    name: &str,
    quotas: Vec<QuotaInput>,
) -> crate::Result<()> {
    let mut specs = Vec::with_capacity(quotas.len());
    for quota in quotas {
        let resource = core.resource_names_mut().get_or_allocate_id(&quota.resource);
        let mut flavors = Vec::with_capacity(quota.flavors.len());
        for (flavor_name, capacity) in quota.flavors {
            let flavor = core
                .flavors()
                .get(&flavor_name)
                .ok_or_else(|| Error::InvalidFlavor(flavor_name.clone()))?;
            flavors.push((flavor, capacity));
        }
        specs.push(QuotaSpec { resource, flavors });
    }

    if core.get_cluster_queue(name).is_none() {
        core.add_cluster_queue(ClusterQueue::new(name));
    }
    let split = core.split_mut();
    let queue = split.cluster_queues.get_mut(name).unwrap();
    queue.configure(specs, split.flavors)?;

    comm.emit(EngineEvent::ClusterQueueConfigured {
        name: name.to_string(),
    });
    // Capacity may have grown
    wake_queue_waiters(core, name);
    Ok(())
}

pub fn on_cluster_queue_removed(core: &mut Core, name: &str) {
    let split = core.split_mut();
    if let Some(mut queue) = split.cluster_queues.remove(name) {
        queue.unconfigure(split.flavors);
        log::debug!("Cluster queue {name} removed");
    }
}

pub fn on_local_queue_upsert(core: &mut Core, key: &ObjectRef, cluster_queue: &str) {
    core.get_or_create_local_queue(key).bind(cluster_queue);
}

pub fn on_local_queue_removed(core: &mut Core, key: &ObjectRef) {
    if core.remove_local_queue(key).is_some() {
        log::debug!("Local queue {key} removed");
    }
}
