use std::time::Duration;

fn get_duration_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timing knobs of the engine loop. Every field can be overridden with a
/// `SLUICE_*_MS` environment variable.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// First non-zero delay of the admission retry ladder.
    pub backoff_base: Duration,
    /// Ceiling of the admission retry ladder; bounds retry frequency, not
    /// total wait.
    pub backoff_ceiling: Duration,
    /// How often the engine re-runs the admission pass even without any
    /// triggering message, to catch missed signals.
    pub sweep_interval: Duration,
    /// How often to check whether a scheduling pass is wanted.
    pub schedule_tick: Duration,
    /// Run a pass at least this often while messages keep arriving.
    pub max_schedule_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            backoff_base: get_duration_from_env("SLUICE_BACKOFF_BASE_MS")
                .unwrap_or_else(|| Duration::from_secs(1)),
            backoff_ceiling: get_duration_from_env("SLUICE_BACKOFF_CEILING_MS")
                .unwrap_or_else(|| Duration::from_secs(5 * 60)),
            sweep_interval: get_duration_from_env("SLUICE_SWEEP_INTERVAL_MS")
                .unwrap_or_else(|| Duration::from_secs(30)),
            schedule_tick: get_duration_from_env("SLUICE_SCHEDULE_TICK_MS")
                .unwrap_or_else(|| Duration::from_millis(50)),
            max_schedule_delay: get_duration_from_env("SLUICE_MAX_SCHEDULE_DELAY_MS")
                .unwrap_or_else(|| Duration::from_secs(1)),
        }
    }
}
