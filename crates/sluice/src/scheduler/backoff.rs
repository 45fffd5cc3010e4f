use std::time::{Duration, Instant};

/// Retry delay ladder for workloads waiting on capacity. Each failed
/// admission attempt moves one level up; the last level repeats until the
/// workload is admitted or woken by a capacity change.
#[derive(Debug)]
pub struct BackoffPolicy {
    delays: Vec<Duration>,
}

impl BackoffPolicy {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        assert!(!base.is_zero());
        let mut delays = vec![Duration::ZERO];
        let mut delay = base;
        while delay < ceiling {
            delays.push(delay);
            delay *= 2;
        }
        delays.push(ceiling);
        BackoffPolicy { delays }
    }

    fn delay_for(&self, level: usize) -> Duration {
        self.delays[level.min(self.delays.len() - 1)]
    }
}

/// Per-workload admission retry state.
#[derive(Debug, Default)]
pub struct AdmissionBackoff {
    level: usize,
    next_attempt: Option<Instant>,
}

impl AdmissionBackoff {
    /// Returns true when the next admission attempt may run.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.next_attempt {
            Some(deadline) => now >= deadline,
            None => true,
        }
    }

    /// Records a capacity failure, pushing the next attempt further out.
    pub fn record_failure(&mut self, now: Instant, policy: &BackoffPolicy) {
        self.level += 1;
        self.next_attempt = Some(now + policy.delay_for(self.level));
    }

    /// Clears the backoff; used when capacity on the relevant queue changes,
    /// so a freed queue is retried immediately.
    pub fn reset(&mut self) {
        self.level = 0;
        self.next_attempt = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_is_capped() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(8));
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(100), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_due() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(8));
        let mut backoff = AdmissionBackoff::default();
        let now = Instant::now();
        assert!(backoff.is_due(now));
        backoff.record_failure(now, &policy);
        assert!(!backoff.is_due(now));
        assert!(backoff.is_due(now + Duration::from_secs(2)));
        backoff.reset();
        assert!(backoff.is_due(now));
    }
}
