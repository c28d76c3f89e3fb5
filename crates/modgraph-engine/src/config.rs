//! Engine configuration.
//!
//! Reads configuration from environment variables:
//! - `MODGRAPH_FANOUT_THRESHOLD`: fan-out above which a single removal is
//!   flagged as chain-amplified (default: 10)

use serde::{Deserialize, Serialize};

/// Environment variable holding the fan-out threshold.
pub const FAN_OUT_THRESHOLD_ENV: &str = "MODGRAPH_FANOUT_THRESHOLD";

/// Default fan-out threshold.
pub const DEFAULT_FAN_OUT_THRESHOLD: usize = 10;

/// Tunables of a graph build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// A Remove whose target reaches strictly more than this many distinct
    /// entities is a chain-amplified caution.
    pub fan_out_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            fan_out_threshold: DEFAULT_FAN_OUT_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = EngineConfig::default();
        if let Some(raw) = lookup(FAN_OUT_THRESHOLD_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(threshold) => config.fan_out_threshold = threshold,
                Err(_) => tracing::warn!(
                    "ignoring {}={:?}: not a non-negative integer, using {}",
                    FAN_OUT_THRESHOLD_ENV,
                    raw,
                    DEFAULT_FAN_OUT_THRESHOLD
                ),
            }
        }
        config
    }

    pub fn with_fan_out_threshold(mut self, threshold: usize) -> Self {
        self.fan_out_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config.fan_out_threshold, DEFAULT_FAN_OUT_THRESHOLD);
    }

    #[test]
    fn reads_threshold() {
        let config = EngineConfig::from_lookup(|key| {
            (key == FAN_OUT_THRESHOLD_ENV).then(|| " 25 ".to_string())
        });
        assert_eq!(config.fan_out_threshold, 25);
    }

    #[test]
    fn bad_threshold_falls_back() {
        let config = EngineConfig::from_lookup(|_| Some("lots".to_string()));
        assert_eq!(config, EngineConfig::default());
    }
}
