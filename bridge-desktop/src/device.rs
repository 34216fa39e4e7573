//! Peripheral stand-ins: identity, feedback and the local button

use async_trait::async_trait;
use bridge_traits::{
    device::{ButtonInput, DeviceInfo, FeedbackCue, FeedbackIndicator},
    error::Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Fixed identity for a simulated device.
#[derive(Debug, Clone)]
pub struct StaticDeviceInfo {
    mac_address: String,
    firmware_version: String,
    signal_strength: Option<i32>,
}

impl StaticDeviceInfo {
    pub fn new(mac_address: impl Into<String>, firmware_version: impl Into<String>) -> Self {
        Self {
            mac_address: mac_address.into(),
            firmware_version: firmware_version.into(),
            signal_strength: None,
        }
    }

    pub fn with_signal_strength(mut self, rssi: i32) -> Self {
        self.signal_strength = Some(rssi);
        self
    }
}

impl DeviceInfo for StaticDeviceInfo {
    fn mac_address(&self) -> String {
        self.mac_address.clone()
    }

    fn firmware_version(&self) -> String {
        self.firmware_version.clone()
    }

    fn signal_strength(&self) -> Option<i32> {
        self.signal_strength
    }
}

/// Reports feedback cues through the log instead of an LED.
#[derive(Debug, Default)]
pub struct TracingFeedback;

#[async_trait]
impl FeedbackIndicator for TracingFeedback {
    async fn cue(&self, cue: FeedbackCue) -> Result<()> {
        info!(cue = ?cue, "Feedback");
        Ok(())
    }
}

/// Button pressed programmatically, e.g. from a console command.
///
/// A press is latched until the next poll consumes it.
#[derive(Debug, Default)]
pub struct ManualButton {
    latched: AtomicBool,
}

impl ManualButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.latched.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ButtonInput for ManualButton {
    async fn was_pressed(&self) -> Result<bool> {
        Ok(self.latched.swap(false, Ordering::SeqCst))
    }
}
