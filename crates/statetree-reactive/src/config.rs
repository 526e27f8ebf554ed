use serde::{Deserialize, Serialize};

/// Default upper bound on flush rounds before a cascade is reported.
pub const DEFAULT_MAX_FLUSH_ROUNDS: usize = 10_000;

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// Number of rounds one `flush()` may run before giving up with
    /// [`ReactiveError::FlushLimitExceeded`](crate::ReactiveError).
    pub max_flush_rounds: usize,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            max_flush_rounds: DEFAULT_MAX_FLUSH_ROUNDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: ReactiveConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ReactiveConfig::default());
    }

    #[test]
    fn loads_from_toml() {
        let cfg: ReactiveConfig = toml::from_str("max_flush_rounds = 3").unwrap();
        assert_eq!(cfg.max_flush_rounds, 3);
    }
}
