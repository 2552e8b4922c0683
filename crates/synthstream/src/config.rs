use crate::query::{STREAMING_SCENARIO, StreamDefaults};
use core::time::Duration;
use serde::{Deserialize, Serialize};

/// Runtime configuration for a [`StreamRegistry`](crate::StreamRegistry).
///
/// All timing values are in milliseconds. The defaults reproduce the
/// dashboard's test-data behavior and rarely need changing outside tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Descriptors with any other scenario identifier are skipped.
    pub scenario_id: String,

    /// Options applied when a descriptor omits them.
    pub defaults: StreamDefaults,

    /// Delay between worker creation and the first buffer population.
    pub startup_delay_ms: u64,

    /// Floor applied to every tick interval.
    pub min_tick_interval_ms: u64,

    /// How long after the request start an unobserved periodic worker keeps
    /// ticking before it stops itself.
    pub orphan_timeout_ms: i64,

    /// Connect timeout of the HTTP client used by fetch streams.
    pub fetch_timeout_ms: u64,

    /// Largest buffer a stream may hold. Descriptors asking for more, through
    /// `buffer` or the request's `maxDataPoints`, are rejected.
    pub max_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            scenario_id: STREAMING_SCENARIO.to_string(),
            defaults: StreamDefaults::default(),
            startup_delay_ms: 10,
            min_tick_interval_ms: 5,
            orphan_timeout_ms: 1_000,
            fetch_timeout_ms: 30_000,
            max_capacity: 1_000_000,
        }
    }
}

impl RegistryConfig {
    pub(crate) const fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    /// Applies the tick floor to `speed`.
    pub(crate) fn tick_interval(&self, speed: u64) -> Duration {
        Duration::from_millis(speed.max(self.min_tick_interval_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_is_floored() {
        let config = RegistryConfig::default();
        assert_eq!(config.tick_interval(0), Duration::from_millis(5));
        assert_eq!(config.tick_interval(4), Duration::from_millis(5));
        assert_eq!(config.tick_interval(250), Duration::from_millis(250));
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: RegistryConfig =
            serde_json::from_str(r#"{"scenarioId": "live", "minTickIntervalMs": 20}"#).unwrap();
        assert_eq!(config.scenario_id, "live");
        assert_eq!(config.min_tick_interval_ms, 20);
        assert_eq!(config.orphan_timeout_ms, 1_000);
        assert_eq!(config.defaults.speed, 250);
        assert_eq!(config.max_capacity, 1_000_000);
    }
}
