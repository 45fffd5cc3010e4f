pub mod backoff;

pub use backoff::{AdmissionBackoff, BackoffPolicy};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use crate::Error;
use crate::common::Set;
use crate::engine::comm::Comm;
use crate::engine::core::Core;
use crate::engine::events::EngineEvent;
use crate::workload::{ConditionKind, WorkloadState, reason};

/// Drains the pending set and attempts admission, FIFO per cluster queue.
///
/// Cluster queues are independent: a workload blocked on capacity in one
/// queue never delays admission into another. Within a queue the first
/// workload that fails on capacity (or is still in backoff) blocks the rest
/// of that queue for this pass, preserving submission order. Misconfigured
/// workloads are skipped with a condition update and retried on later
/// passes; they block nobody.
pub fn run_admission_pass(
    core: &mut Core,
    comm: &mut impl Comm,
    policy: &BackoffPolicy,
    now: Instant,
    wall: DateTime<Utc>,
) {
    let split = core.split_mut();
    let mut blocked: Set<String> = Set::new();
    let mut admitted = Vec::new();

    for &id in split.pending.iter() {
        let Some(workload) = split.workloads.get(id) else {
            continue;
        };
        let queue_key = workload.queue().clone();

        let Some(local_queue) = split.local_queues.get(&queue_key) else {
            split.workloads.get_mut(id).unwrap().set_condition(
                ConditionKind::Admitted,
                false,
                reason::QUEUE_NOT_FOUND,
                format!("Local queue {queue_key} does not exist"),
                wall,
            );
            continue;
        };
        let cluster_queue_name = match local_queue.resolve() {
            Ok(name) => name.to_string(),
            Err(_) => {
                split.workloads.get_mut(id).unwrap().set_condition(
                    ConditionKind::Admitted,
                    false,
                    reason::QUEUE_UNBOUND,
                    format!("Local queue {queue_key} is not bound to a cluster queue"),
                    wall,
                );
                continue;
            }
        };
        if blocked.contains(&cluster_queue_name) {
            continue;
        }
        let Some(cluster_queue) = split.cluster_queues.get_mut(&cluster_queue_name) else {
            split.workloads.get_mut(id).unwrap().set_condition(
                ConditionKind::Admitted,
                false,
                reason::CLUSTER_QUEUE_NOT_FOUND,
                format!("Cluster queue {cluster_queue_name} does not exist"),
                wall,
            );
            continue;
        };

        let workload = split.workloads.get_mut(id).unwrap();
        if let Some(backoff) = workload.backoff_mut() {
            if !backoff.is_due(now) {
                // Keeps its FIFO slot; later workloads must not overtake it
                blocked.insert(cluster_queue_name);
                continue;
            }
        }

        *split.reservation_counter += 1;
        let reservation_id = (*split.reservation_counter).into();
        match cluster_queue.try_reserve(reservation_id, &workload.request, split.resource_names) {
            Ok(reservation) => {
                log::info!(
                    "Workload {} ({}) admitted by cluster queue {}",
                    workload.id,
                    workload.key(),
                    cluster_queue_name
                );
                cluster_queue.mark_used(&reservation);
                workload.set_condition(
                    ConditionKind::Admitted,
                    true,
                    reason::ADMITTED,
                    format!("Admitted by cluster queue {cluster_queue_name}"),
                    wall,
                );
                let cluster_queue_arc: Arc<str> = cluster_queue_name.as_str().into();
                workload.state = WorkloadState::Admitted {
                    cluster_queue: cluster_queue_arc,
                    reservation,
                };
                comm.set_suspended(workload.job, false);
                comm.emit(EngineEvent::WorkloadAdmitted {
                    workload: id,
                    cluster_queue: cluster_queue_name,
                });
                admitted.push(id);
            }
            Err(Error::InsufficientCapacity { resource }) => {
                workload.set_condition(
                    ConditionKind::Admitted,
                    false,
                    reason::INSUFFICIENT_CAPACITY,
                    format!(
                        "Cluster queue {cluster_queue_name} has insufficient capacity for resource '{resource}'"
                    ),
                    wall,
                );
                if let Some(backoff) = workload.backoff_mut() {
                    backoff.record_failure(now, policy);
                }
                blocked.insert(cluster_queue_name);
            }
            Err(error) => {
                // try_reserve has no other failure mode today
                log::error!("Admission of workload {id} failed: {error}");
            }
        }
    }

    for id in admitted {
        split.pending.remove(&id);
    }
}

/// Clears admission backoffs of all pending workloads currently bound to
/// the given cluster queue. Called whenever the queue's capacity may have
/// grown (reconfiguration, a release), so freed capacity is retried
/// immediately instead of waiting out the ladder.
pub fn wake_queue_waiters(core: &mut Core, cluster_queue: &str) {
    let split = core.split_mut();
    for &id in split.pending.iter() {
        let Some(workload) = split.workloads.get(id) else {
            continue;
        };
        let bound = split
            .local_queues
            .get(workload.queue())
            .and_then(|lq| lq.resolve().ok())
            .is_some_and(|name| name == cluster_queue);
        if bound {
            if let Some(backoff) = split.workloads.get_mut(id).unwrap().backoff_mut() {
                backoff.reset();
            }
        }
    }
}
