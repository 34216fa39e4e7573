//! Control channel tuning.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Period of the plain `bhajan_status` push.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_status_interval")]
    pub status_interval: Duration,

    /// Period of the `status_update` push carrying device health.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_enhanced_status_interval")]
    pub enhanced_status_interval: Duration,

    /// Track name used when a play command carries none.
    ///
    /// Default: `Playing Bhajan`.
    #[serde(default = "default_play_name")]
    pub default_play_name: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            status_interval: default_status_interval(),
            enhanced_status_interval: default_enhanced_status_interval(),
            default_play_name: default_play_name(),
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.status_interval.is_zero() || self.enhanced_status_interval.is_zero() {
            return Err("status intervals must be > 0".to_string());
        }
        if self.default_play_name.is_empty() {
            return Err("default_play_name cannot be empty".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_status_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_enhanced_status_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_play_name() -> String {
    "Playing Bhajan".to_string()
}
