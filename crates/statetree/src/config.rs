use serde::{Deserialize, Serialize};
use statetree_reactive::ReactiveConfig;

use crate::error::ConfigError;

/// What `set_value` does when the new value equals the current one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueChangePolicy {
    /// Store and fire a change event every time.
    #[default]
    AlwaysNotify,
    /// Leave the property untouched and fire nothing.
    SkipUnchanged,
}

/// Tree-wide settings.
///
/// ```toml
/// value_change_policy = "skip_unchanged"
/// track_changes = true
///
/// [reactive]
/// max_flush_rounds = 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub value_change_policy: ValueChangePolicy,
    /// Record [`NodeChange`](crate::NodeChange)s for attached nodes.
    pub track_changes: bool,
    pub reactive: ReactiveConfig,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            value_change_policy: ValueChangePolicy::default(),
            track_changes: true,
            reactive: ReactiveConfig::default(),
        }
    }
}

impl TreeConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}
