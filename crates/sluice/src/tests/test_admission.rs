use std::time::Duration;

use crate::resources::ResourceAmount;
use crate::tests::utils::TestEnv;
use crate::workload::{ConditionKind, reason};

#[test]
fn test_admitted_implies_reservation() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq", &[("cpu", "default", "4")]).unwrap();
    env.bind_local_queue("ns", "main", "cq");

    let (_job, workload) = env.submit_job("ns", "job-a", Some("main"), &[("cpu", "3")]);
    let workload = workload.unwrap();
    env.run_pass();

    env.assert_admitted(workload);
    assert!(env.workload(workload).in_condition(ConditionKind::Admitted));
    assert_eq!(env.total_reserved("cq"), ResourceAmount::new_units(3));
    assert_eq!(env.workload(workload).admitted_queue(), Some("cq"));
}

#[test]
fn test_fifo_order_within_queue() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq", &[("cpu", "default", "1")]).unwrap();
    env.bind_local_queue("ns", "main", "cq");

    let (job_a, wl_a) = env.submit_job("ns", "job-a", Some("main"), &[("cpu", "1")]);
    let (_job_b, wl_b) = env.submit_job("ns", "job-b", Some("main"), &[("cpu", "1")]);
    let (wl_a, wl_b) = (wl_a.unwrap(), wl_b.unwrap());
    env.run_pass();

    // The earlier submission wins the capacity
    env.assert_admitted(wl_a);
    env.assert_pending(wl_b);

    env.finish_job(job_a);
    assert_eq!(env.total_reserved("cq"), ResourceAmount::ZERO);
    env.run_pass();
    env.assert_admitted(wl_b);
}

#[test]
fn test_head_of_line_blocks_smaller_workload() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq", &[("cpu", "default", "1")]).unwrap();
    env.bind_local_queue("ns", "main", "cq");

    // Can never fit, but keeps its FIFO slot
    let (_job_a, wl_a) = env.submit_job("ns", "big", Some("main"), &[("cpu", "2")]);
    let (_job_b, wl_b) = env.submit_job("ns", "small", Some("main"), &[("cpu", "1")]);
    let (wl_a, wl_b) = (wl_a.unwrap(), wl_b.unwrap());
    env.run_pass();

    env.assert_pending(wl_a);
    env.assert_pending(wl_b);
    assert_eq!(env.total_reserved("cq"), ResourceAmount::ZERO);
    let condition = env
        .workload(wl_a)
        .condition(ConditionKind::Admitted)
        .unwrap();
    assert!(!condition.status);
    assert_eq!(condition.reason, reason::INSUFFICIENT_CAPACITY);
}

#[test]
fn test_queues_do_not_block_each_other() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq-a", &[("cpu", "default", "0.5")]).unwrap();
    env.configure_queue("cq-b", &[("cpu", "default", "2")]).unwrap();
    env.bind_local_queue("ns", "queue-a", "cq-a");
    env.bind_local_queue("ns", "queue-b", "cq-b");

    let (_job_a, wl_a) = env.submit_job("ns", "job-a", Some("queue-a"), &[("cpu", "1")]);
    let (_job_b, wl_b) = env.submit_job("ns", "job-b", Some("queue-b"), &[("cpu", "1")]);
    env.run_pass();

    // A blocked head of line in cq-a does not delay cq-b
    env.assert_pending(wl_a.unwrap());
    env.assert_admitted(wl_b.unwrap());
}

#[test]
fn test_misconfigured_workload_does_not_block_queue() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq", &[("cpu", "default", "2")]).unwrap();
    env.bind_local_queue("ns", "main", "cq");

    // Earlier submission points at a queue that does not exist
    let (_job_a, wl_a) = env.submit_job("ns", "lost", Some("nowhere"), &[("cpu", "1")]);
    let (_job_b, wl_b) = env.submit_job("ns", "ok", Some("main"), &[("cpu", "1")]);
    let (wl_a, wl_b) = (wl_a.unwrap(), wl_b.unwrap());
    env.run_pass();

    env.assert_pending(wl_a);
    env.assert_admitted(wl_b);
    let condition = env
        .workload(wl_a)
        .condition(ConditionKind::Admitted)
        .unwrap();
    assert_eq!(condition.reason, reason::QUEUE_NOT_FOUND);
}

#[test]
fn test_unbound_local_queue() {
    let mut env = TestEnv::new();
    let mut queue = crate::queue::LocalQueue::new(crate::ObjectRef::new("ns", "main"));
    assert!(queue.resolve().is_err());
    queue.bind("cq");

    // Reactor path: local queue exists but its cluster queue does not
    env.bind_local_queue("ns", "main", "cq");
    let (_job, workload) = env.submit_job("ns", "job-a", Some("main"), &[("cpu", "1")]);
    let workload = workload.unwrap();
    env.run_pass();
    env.assert_pending(workload);
    let condition = env
        .workload(workload)
        .condition(ConditionKind::Admitted)
        .unwrap();
    assert_eq!(condition.reason, reason::CLUSTER_QUEUE_NOT_FOUND);
}

#[test]
fn test_rebind_does_not_affect_admitted_workload() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq-a", &[("cpu", "default", "1")]).unwrap();
    env.configure_queue("cq-b", &[("cpu", "default", "1")]).unwrap();
    env.bind_local_queue("ns", "main", "cq-a");

    let (job, workload) = env.submit_job("ns", "job-a", Some("main"), &[("cpu", "1")]);
    let workload = workload.unwrap();
    env.run_pass();
    env.assert_admitted(workload);

    env.bind_local_queue("ns", "main", "cq-b");
    assert_eq!(env.workload(workload).admitted_queue(), Some("cq-a"));

    // Capacity flows back to the queue it was taken from
    env.finish_job(job);
    assert_eq!(env.total_reserved("cq-a"), ResourceAmount::ZERO);
    assert_eq!(env.total_reserved("cq-b"), ResourceAmount::ZERO);
}

#[test]
fn test_remove_pending_workload() {
    let mut env = TestEnv::new();
    env.bind_local_queue("ns", "main", "cq");
    let (job, workload) = env.submit_job("ns", "job-a", Some("main"), &[("cpu", "1")]);
    let workload = workload.unwrap();
    env.remove_job(job);
    assert!(env.core.workloads().get(workload).is_none());
    assert!(env.core.pending().is_empty());
}

#[test]
fn test_remove_admitted_workload_releases_capacity() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq", &[("cpu", "default", "1")]).unwrap();
    env.bind_local_queue("ns", "main", "cq");

    let (job_a, wl_a) = env.submit_job("ns", "job-a", Some("main"), &[("cpu", "1")]);
    let (_job_b, wl_b) = env.submit_job("ns", "job-b", Some("main"), &[("cpu", "1")]);
    env.run_pass();
    env.assert_admitted(wl_a.unwrap());

    env.remove_job(job_a);
    assert_eq!(env.total_reserved("cq"), ResourceAmount::ZERO);
    env.run_pass();
    env.assert_admitted(wl_b.unwrap());
}

#[test]
fn test_backoff_and_capacity_wakeup() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq", &[("cpu", "default", "1")]).unwrap();
    env.bind_local_queue("ns", "main", "cq");

    let (_job, workload) = env.submit_job("ns", "job-a", Some("main"), &[("cpu", "2")]);
    let workload = workload.unwrap();
    env.run_pass();
    env.assert_pending(workload);

    // Growing the queue resets the backoff, so the next pass admits
    // without waiting out the ladder
    env.configure_queue("cq", &[("cpu", "default", "4")]).unwrap();
    env.run_pass();
    env.assert_admitted(workload);
}

#[test]
fn test_backoff_delays_retry() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq", &[("cpu", "default", "1")]).unwrap();
    env.bind_local_queue("ns", "main", "cq");

    let (job_a, wl_a) = env.submit_job("ns", "holder", Some("main"), &[("cpu", "1")]);
    env.run_pass();
    env.assert_admitted(wl_a.unwrap());

    let (_job_b, wl_b) = env.submit_job("ns", "waiter", Some("main"), &[("cpu", "1")]);
    let wl_b = wl_b.unwrap();
    env.run_pass();
    env.assert_pending(wl_b);

    // Freeing capacity wakes the waiter immediately despite the backoff
    env.finish_job(job_a);
    env.run_pass();
    env.assert_admitted(wl_b);
}

#[test]
fn test_job_without_annotation_is_ignored() {
    let mut env = TestEnv::new();
    let (job, workload) = env.submit_job("ns", "plain", None, &[("cpu", "1")]);
    assert!(workload.is_none());
    assert!(env.core.workloads().is_empty());
    // The job was never suspended by the engine
    assert_eq!(env.store.is_suspended(job), None);
}

#[test]
fn test_invalid_request_is_not_enqueued() {
    let mut env = TestEnv::new();
    env.bind_local_queue("ns", "main", "cq");
    let (_job, workload) = env.submit_job("ns", "empty", Some("main"), &[]);
    let workload = workload.unwrap();
    assert!(env.core.pending().is_empty());
    let condition = env
        .workload(workload)
        .condition(ConditionKind::Admitted)
        .unwrap();
    assert_eq!(condition.reason, reason::INVALID_REQUEST);
}

#[test]
fn test_finish_before_admission_drops_workload() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq", &[("cpu", "default", "1")]).unwrap();
    env.bind_local_queue("ns", "main", "cq");

    let (job_a, wl_a) = env.submit_job("ns", "holder", Some("main"), &[("cpu", "1")]);
    env.run_pass();
    env.assert_admitted(wl_a.unwrap());

    let (job_b, wl_b) = env.submit_job("ns", "racer", Some("main"), &[("cpu", "1")]);
    let wl_b = wl_b.unwrap();
    // Completion arrives while the workload is still waiting on capacity
    env.finish_job(job_b);
    assert!(env.core.workloads().get(wl_b).is_none());
    assert!(!env.core.pending().contains(&wl_b));

    // The capacity freed by the first job must not admit the dead workload
    env.finish_job(job_a);
    env.run_pass();
    assert_eq!(env.total_reserved("cq"), ResourceAmount::ZERO);
    assert_eq!(env.store.is_suspended(job_b), Some(true));
}

#[test]
fn test_backoff_level_grows_with_failures() {
    let mut env = TestEnv::new();
    env.register_flavor("default");
    env.configure_queue("cq", &[("cpu", "default", "1")]).unwrap();
    env.bind_local_queue("ns", "main", "cq");

    let (_job, workload) = env.submit_job("ns", "big", Some("main"), &[("cpu", "2")]);
    let workload = workload.unwrap();
    env.run_pass();
    env.assert_pending(workload);

    // Second pass before the deadline: the attempt is skipped, the
    // failure condition keeps its original transition time
    let before = env
        .workload(workload)
        .condition(ConditionKind::Admitted)
        .unwrap()
        .last_transition;
    env.run_pass();
    let after = env
        .workload(workload)
        .condition(ConditionKind::Admitted)
        .unwrap()
        .last_transition;
    assert_eq!(before, after);

    // After the delay the attempt runs again (and fails again)
    env.advance(Duration::from_secs(2));
    env.run_pass();
    env.assert_pending(workload);
}
