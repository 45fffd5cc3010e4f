//! Tests of the full engine task: messages in through [`EngineHandle`],
//! suspend flags out through the bridge, events out through the event
//! channel.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::LocalSet;

use crate::bridge::JobStore;
use crate::common::ids::{JobId, ObjectRef};
use crate::engine::core::CoreRef;
use crate::engine::reactor::QuotaInput;
use crate::engine::{EngineConfig, EngineEvent, EngineHandle, engine_process, make_engine_channel};
use crate::resources::ResourceAmount;

fn test_config() -> EngineConfig {
    EngineConfig {
        backoff_base: Duration::from_millis(10),
        backoff_ceiling: Duration::from_millis(100),
        sweep_interval: Duration::from_millis(50),
        schedule_tick: Duration::from_millis(5),
        max_schedule_delay: Duration::from_millis(20),
    }
}

fn run_engine_test<F, Fut>(body: F)
where
    F: FnOnce(EngineHandle, JobStore, mpsc::UnboundedReceiver<EngineEvent>) -> Fut,
    Fut: Future<Output = ()>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let set = LocalSet::new();
    set.block_on(&runtime, async move {
        let (handle, receiver) = make_engine_channel();
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let store = JobStore::new();
        let engine = tokio::task::spawn_local(engine_process(
            CoreRef::wrap(Default::default()),
            test_config(),
            store.clone(),
            receiver,
            Some(event_sender),
        ));
        body(handle.clone(), store, event_receiver).await;
        handle.stop();
        engine.await.unwrap();
    });
}

async fn wait_for_suspend(store: &JobStore, job: JobId, expected: bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.is_suspended(job) != Some(expected) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("suspend flag was not written in time");
}

async fn wait_for_event(
    receiver: &mut mpsc::UnboundedReceiver<EngineEvent>,
    mut predicate: impl FnMut(&EngineEvent) -> bool,
) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = receiver.recv().await.expect("event channel closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event was not emitted in time")
}

fn cpu_quota(capacity: &str) -> Vec<QuotaInput> {
    vec![QuotaInput {
        resource: "cpu".to_string(),
        flavors: vec![(
            "default".to_string(),
            capacity.parse::<ResourceAmount>().unwrap(),
        )],
    }]
}

#[test]
fn test_engine_admits_and_finishes_job() {
    run_engine_test(|handle, store, mut events| async move {
        handle.upsert_flavor("default");
        handle
            .upsert_cluster_queue("cluster-queue", cpu_quota("2"))
            .await
            .unwrap();
        handle.upsert_local_queue(ObjectRef::new("team-a", "main"), "cluster-queue");

        let submission = store.insert_job(
            "team-a",
            "training",
            Some("main"),
            vec![("cpu".to_string(), ResourceAmount::new_units(1))],
        );
        let job = submission.job;
        handle.on_job_created(submission);

        wait_for_suspend(&store, job, false).await;
        wait_for_event(&mut events, |e| {
            matches!(e, EngineEvent::WorkloadAdmitted { .. })
        })
        .await;

        let status = handle
            .workload_status(ObjectRef::new("team-a", "training"))
            .await
            .unwrap();
        assert_eq!(status["state"], "A(cluster-queue)");

        handle.on_job_finished(job);
        wait_for_event(&mut events, |e| {
            matches!(e, EngineEvent::ReservationReleased { .. })
        })
        .await;

        let status = handle.cluster_queue_status("cluster-queue").await.unwrap();
        assert_eq!(status["quotas"][0]["flavors"][0]["reserved"], "0");
    });
}

#[test]
fn test_engine_serializes_on_exhausted_queue() {
    run_engine_test(|handle, store, mut events| async move {
        handle.upsert_flavor("default");
        handle
            .upsert_cluster_queue("cluster-queue", cpu_quota("1"))
            .await
            .unwrap();
        handle.upsert_local_queue(ObjectRef::new("team-a", "main"), "cluster-queue");

        let cpu = vec![("cpu".to_string(), ResourceAmount::new_units(1))];
        let first = store.insert_job("team-a", "first", Some("main"), cpu.clone());
        let second = store.insert_job("team-a", "second", Some("main"), cpu);
        let (job_a, job_b) = (first.job, second.job);
        handle.on_job_created(first);
        handle.on_job_created(second);

        wait_for_suspend(&store, job_a, false).await;
        assert_eq!(store.is_suspended(job_b), Some(true));

        handle.on_job_finished(job_a);
        wait_for_suspend(&store, job_b, false).await;
        wait_for_event(&mut events, |e| {
            matches!(e, EngineEvent::WorkloadAdmitted { workload, .. } if workload.as_num() == 2)
        })
        .await;
    });
}

#[test]
fn test_engine_retries_failed_suspend_writes() {
    run_engine_test(|handle, store, _events| async move {
        store.set_fail_deliveries(true);
        let submission = store.insert_job("team-a", "training", Some("main"), vec![(
            "cpu".to_string(),
            ResourceAmount::new_units(1),
        )]);
        let job = submission.job;
        handle.on_job_created(submission);

        // The first write fails and is queued for retry
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.is_suspended(job), None);

        store.set_fail_deliveries(false);
        wait_for_suspend(&store, job, true).await;
    });
}

#[test]
fn test_engine_status_queries_for_unknown_objects() {
    run_engine_test(|handle, _store, _events| async move {
        assert!(
            handle
                .workload_status(ObjectRef::new("nowhere", "nothing"))
                .await
                .is_none()
        );
        assert!(handle.cluster_queue_status("nothing").await.is_none());
    });
}
