pub mod map;

pub use map::WorkloadMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

use crate::common::ids::{JobId, ObjectRef, WorkloadId};
use crate::queue::Reservation;
use crate::resources::ResourceRequest;
use crate::scheduler::backoff::AdmissionBackoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    Admitted,
    Finished,
}

pub mod reason {
    pub const ADMITTED: &str = "AdmittedByQueue";
    pub const JOB_FINISHED: &str = "JobFinished";
    pub const QUEUE_NOT_FOUND: &str = "QueueNotFound";
    pub const CLUSTER_QUEUE_NOT_FOUND: &str = "ClusterQueueNotFound";
    pub const QUEUE_UNBOUND: &str = "QueueUnbound";
    pub const INSUFFICIENT_CAPACITY: &str = "InsufficientCapacity";
    pub const INVALID_REQUEST: &str = "InvalidRequest";
}

/// One status condition with last-transition semantics: re-asserting the
/// same status only refreshes reason/message, not the timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub status: bool,
    pub last_transition: DateTime<Utc>,
    pub reason: &'static str,
    pub message: String,
}

pub enum WorkloadState {
    Pending { backoff: AdmissionBackoff },
    Admitted { cluster_queue: Arc<str>, reservation: Reservation },
    Finished,
}

impl fmt::Debug for WorkloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending { .. } => write!(f, "P"),
            Self::Admitted { cluster_queue, .. } => write!(f, "A({cluster_queue})"),
            Self::Finished => write!(f, "F"),
        }
    }
}

/// The queueing-domain record tracking admission for one submitted job.
///
/// Lifecycle: `Pending -> Admitted -> Finished`. A workload is admitted at
/// most once and `Finished` is only reachable from `Admitted`.
pub struct Workload {
    pub id: WorkloadId,
    key: ObjectRef,
    pub job: JobId,
    /// Local queue named by the job's queue annotation.
    queue: ObjectRef,
    pub request: ResourceRequest,
    pub state: WorkloadState,
    conditions: Vec<Condition>,
    pub created: DateTime<Utc>,
}

impl fmt::Debug for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workload")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("state", &self.state)
            .finish()
    }
}

impl Workload {
    pub fn new(
        id: WorkloadId,
        key: ObjectRef,
        job: JobId,
        queue: ObjectRef,
        request: ResourceRequest,
        now: DateTime<Utc>,
    ) -> Self {
        log::debug!("New workload {id} ({key}) for job {job}, requesting {request}");
        Workload {
            id,
            key,
            job,
            queue,
            request,
            state: WorkloadState::Pending {
                backoff: AdmissionBackoff::default(),
            },
            conditions: Vec::new(),
            created: now,
        }
    }

    #[inline]
    pub fn key(&self) -> &ObjectRef {
        &self.key
    }

    #[inline]
    pub fn queue(&self) -> &ObjectRef {
        &self.queue
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, WorkloadState::Pending { .. })
    }

    #[inline]
    pub fn is_admitted(&self) -> bool {
        matches!(self.state, WorkloadState::Admitted { .. })
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, WorkloadState::Finished)
    }

    pub fn backoff_mut(&mut self) -> Option<&mut AdmissionBackoff> {
        match &mut self.state {
            WorkloadState::Pending { backoff } => Some(backoff),
            _ => None,
        }
    }

    /// Cluster queue this workload was admitted against, if any. Recorded
    /// at admission time; unaffected by later local queue rebinds.
    pub fn admitted_queue(&self) -> Option<&str> {
        match &self.state {
            WorkloadState::Admitted { cluster_queue, .. } => Some(cluster_queue),
            _ => None,
        }
    }

    pub fn condition(&self, kind: ConditionKind) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }

    pub fn in_condition(&self, kind: ConditionKind) -> bool {
        self.condition(kind).is_some_and(|c| c.status)
    }

    pub fn set_condition(
        &mut self,
        kind: ConditionKind,
        status: bool,
        reason: &'static str,
        message: String,
        now: DateTime<Utc>,
    ) {
        match self.conditions.iter_mut().find(|c| c.kind == kind) {
            Some(condition) => {
                if condition.status != status {
                    condition.status = status;
                    condition.last_transition = now;
                }
                condition.reason = reason;
                condition.message = message;
            }
            None => self.conditions.push(Condition {
                kind,
                status,
                last_transition: now,
                reason,
                message,
            }),
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn dump(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "key": self.key.to_string(),
            "job": self.job,
            "queue": self.queue.to_string(),
            "state": format!("{:?}", self.state),
            "conditions": self.conditions,
            "created": self.created,
        })
    }
}
