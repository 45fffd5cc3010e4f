use crate::common::ids::JobId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("resource flavor '{0}' is not registered")]
    InvalidFlavor(String),
    #[error("resource flavor '{0}' is still referenced by a cluster queue")]
    FlavorInUse(String),
    #[error("insufficient capacity for resource '{resource}'")]
    InsufficientCapacity { resource: String },
    #[error("local queue '{0}' is not bound to a cluster queue")]
    UnboundQueue(String),
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("could not deliver suspend update to job {0}")]
    Delivery(JobId),
    #[error("error: {0}")]
    GenericError(String),
}

impl AdmissionError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Errors a user can fix by changing queue/flavor configuration.
    /// These are surfaced as workload conditions and retried on later passes.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            Self::InvalidFlavor(_) | Self::UnboundQueue(_) | Self::NotFound { .. }
        )
    }
}

impl From<String> for AdmissionError {
    fn from(e: String) -> Self {
        Self::GenericError(e)
    }
}

impl From<&str> for AdmissionError {
    fn from(e: &str) -> Self {
        Self::GenericError(e.to_string())
    }
}
