use serde::Serialize;

use crate::common::ids::{ObjectRef, WorkloadId};

/// Observable engine transitions, emitted through [`crate::engine::Comm`].
/// Consumed by status observers and by tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EngineEvent {
    WorkloadCreated {
        workload: WorkloadId,
        key: ObjectRef,
    },
    WorkloadAdmitted {
        workload: WorkloadId,
        cluster_queue: String,
    },
    WorkloadFinished {
        workload: WorkloadId,
    },
    WorkloadRemoved {
        workload: WorkloadId,
    },
    ReservationReleased {
        workload: WorkloadId,
        cluster_queue: String,
    },
    ClusterQueueConfigured {
        name: String,
    },
}
