//! Device Peripheral Abstractions
//!
//! Local input, feedback and identity facilities provided by the host
//! firmware. Their rendering and debouncing live outside the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Acknowledgment cue shown when a playback transition happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCue {
    Start,
    Pause,
    Resume,
    Stop,
}

/// Visual (or other) feedback surface, e.g. a status LED.
#[async_trait]
pub trait FeedbackIndicator: Send + Sync {
    async fn cue(&self, cue: FeedbackCue) -> Result<()>;
}

/// Debounced physical button.
#[async_trait]
pub trait ButtonInput: Send + Sync {
    /// Returns `true` once per completed press.
    async fn was_pressed(&self) -> Result<bool>;
}

/// Static and slowly-changing device facts reported to the server.
pub trait DeviceInfo: Send + Sync {
    /// Hardware address used to look up the device's default track.
    fn mac_address(&self) -> String;

    fn firmware_version(&self) -> String;

    /// Network signal strength in dBm, when the host can measure it.
    fn signal_strength(&self) -> Option<i32> {
        None
    }
}
