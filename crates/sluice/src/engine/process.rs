use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::bridge::{Bridge, JobControl};
use crate::engine::comm::CommBuffer;
use crate::engine::config::EngineConfig;
use crate::engine::core::{Core, CoreRef};
use crate::engine::events::EngineEvent;
use crate::engine::reactor;
use crate::engine::service::EngineMessage;
use crate::scheduler::{BackoffPolicy, run_admission_pass};

/// The engine event loop: reacts to change notifications, runs the
/// admission pass when something relevant happened (or after a maximum
/// delay), sweeps periodically to catch missed signals, and drives bridge
/// delivery retries.
pub async fn engine_process<C: JobControl>(
    core_ref: CoreRef,
    config: EngineConfig,
    control: C,
    mut receiver: mpsc::UnboundedReceiver<EngineMessage>,
    event_sender: Option<mpsc::UnboundedSender<EngineEvent>>,
) {
    let policy = BackoffPolicy::new(config.backoff_base, config.backoff_ceiling);
    let mut bridge = Bridge::new(
        control,
        BackoffPolicy::new(config.backoff_base, config.backoff_ceiling),
    );
    let mut comm = CommBuffer::default();

    let mut sweep_interval = tokio::time::interval(config.sweep_interval);
    let mut schedule_interval = tokio::time::interval(config.schedule_tick);
    let mut should_schedule = false;
    let mut last_pass = Instant::now();

    loop {
        tokio::select! {
            _ = sweep_interval.tick() => {
                run_admission_pass(
                    &mut core_ref.get_mut(),
                    &mut comm,
                    &policy,
                    Instant::now(),
                    Utc::now(),
                );
                last_pass = Instant::now();
                flush(&mut comm, &mut bridge, &event_sender);
            }
            _ = schedule_interval.tick() => {
                let now = Instant::now();
                bridge.retry_due(now);
                if should_schedule || last_pass.elapsed() >= config.max_schedule_delay {
                    run_admission_pass(&mut core_ref.get_mut(), &mut comm, &policy, now, Utc::now());
                    should_schedule = false;
                    last_pass = now;
                    flush(&mut comm, &mut bridge, &event_sender);
                }
            }
            message = receiver.recv() => {
                match message {
                    None | Some(EngineMessage::Stop) => break,
                    Some(message) => {
                        if handle_message(&mut core_ref.get_mut(), &mut comm, message) {
                            should_schedule = true;
                        }
                        flush(&mut comm, &mut bridge, &event_sender);
                    }
                }
            }
        }
    }
    log::debug!("Engine process stopped");
}

fn flush(
    comm: &mut CommBuffer,
    bridge: &mut Bridge<impl JobControl>,
    event_sender: &Option<mpsc::UnboundedSender<EngineEvent>>,
) {
    let now = Instant::now();
    for (job, suspended) in comm.take_suspend_writes() {
        bridge.deliver(job, suspended, now);
    }
    for event in comm.take_events() {
        if let Some(sender) = event_sender {
            let _ = sender.send(event);
        }
    }
}

/// Applies one message to the core.
/// Returns `true` if an admission pass should follow.
fn handle_message(core: &mut Core, comm: &mut CommBuffer, message: EngineMessage) -> bool {
    match message {
        EngineMessage::JobCreated(submission) => {
            reactor::on_job_created(core, comm, submission, Utc::now()).is_some()
        }
        EngineMessage::JobFinished(job) => {
            reactor::on_job_finished(core, comm, job, Utc::now());
            true
        }
        EngineMessage::JobRemoved(job) => {
            reactor::on_job_removed(core, comm, job);
            true
        }
        EngineMessage::FlavorUpsert(name) => {
            reactor::on_flavor_upsert(core, &name);
            false
        }
        EngineMessage::FlavorRemoved(name, response) => {
            let _ = response.send(reactor::on_flavor_removed(core, &name));
            false
        }
        EngineMessage::ClusterQueueUpsert {
            name,
            quotas,
            response,
        } => {
            let result = reactor::on_cluster_queue_upsert(core, comm, &name, quotas);
            let schedule = result.is_ok();
            let _ = response.send(result);
            schedule
        }
        EngineMessage::ClusterQueueRemoved(name) => {
            reactor::on_cluster_queue_removed(core, &name);
            false
        }
        EngineMessage::LocalQueueUpsert { key, cluster_queue } => {
            reactor::on_local_queue_upsert(core, &key, &cluster_queue);
            true
        }
        EngineMessage::LocalQueueRemoved(key) => {
            reactor::on_local_queue_removed(core, &key);
            false
        }
        EngineMessage::QueryWorkload(key, response) => {
            let status = core
                .workloads()
                .find_by_key(&key)
                .and_then(|id| core.workloads().get(id))
                .map(|workload| workload.dump());
            let _ = response.send(status);
            false
        }
        EngineMessage::QueryClusterQueue(name, response) => {
            let status = core
                .get_cluster_queue(&name)
                .map(|queue| queue.dump(core.resource_names(), core.flavors()));
            let _ = response.send(status);
            false
        }
        EngineMessage::Stop => unreachable!(),
    }
}
