pub mod store;

pub use store::JobStore;

use std::time::Instant;

use crate::common::ids::JobId;
use crate::scheduler::{AdmissionBackoff, BackoffPolicy};

/// The only surface sluice touches on an external job: its suspend flag.
/// Downstream execution observes this flag to start or stop the job.
pub trait JobControl {
    fn set_suspended(&self, job: JobId, suspended: bool) -> crate::Result<()>;
}

struct PendingDelivery {
    job: JobId,
    suspended: bool,
    backoff: AdmissionBackoff,
}

/// Delivers suspend-flag changes to the external job store with
/// at-least-once semantics. A failed write is queued and retried with
/// backoff; the workload's admission state is never rolled back because of
/// a delivery failure.
pub struct Bridge<C> {
    control: C,
    pending: Vec<PendingDelivery>,
    policy: BackoffPolicy,
}

impl<C: JobControl> Bridge<C> {
    pub fn new(control: C, policy: BackoffPolicy) -> Self {
        Bridge {
            control,
            pending: Vec::new(),
            policy,
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Attempts delivery; on failure the write is queued for retry.
    /// A newer write for the same job replaces any queued one.
    pub fn deliver(&mut self, job: JobId, suspended: bool, now: Instant) {
        self.pending.retain(|d| d.job != job);
        match self.control.set_suspended(job, suspended) {
            Ok(()) => {}
            Err(error) => {
                log::warn!("Suspend update for job {job} failed, will retry: {error}");
                let mut backoff = AdmissionBackoff::default();
                backoff.record_failure(now, &self.policy);
                self.pending.push(PendingDelivery {
                    job,
                    suspended,
                    backoff,
                });
            }
        }
    }

    /// Retries all queued deliveries whose backoff has expired.
    pub fn retry_due(&mut self, now: Instant) {
        let mut still_pending = Vec::new();
        for mut delivery in std::mem::take(&mut self.pending) {
            if !delivery.backoff.is_due(now) {
                still_pending.push(delivery);
                continue;
            }
            match self.control.set_suspended(delivery.job, delivery.suspended) {
                Ok(()) => {
                    log::debug!("Suspend update for job {} delivered", delivery.job);
                }
                Err(error) => {
                    log::warn!(
                        "Suspend update for job {} failed again: {error}",
                        delivery.job
                    );
                    delivery.backoff.record_failure(now, &self.policy);
                    still_pending.push(delivery);
                }
            }
        }
        self.pending = still_pending;
    }
}
