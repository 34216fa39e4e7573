//! Outbound control messages.

use core_playback::{PlaybackSnapshot, PlaybackState};
use serde::Serialize;

/// Messages the device sends to the control server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Playback snapshot, pushed on every status change and periodically.
    BhajanStatus {
        device_id: String,
        status: PlaybackState,
        bhajan_id: i64,
        bhajan_name: String,
        position: u32,
        duration: u32,
        volume: u8,
    },
    /// Sent once per (re)connect.
    InitialStatus {
        device_id: String,
        firmware_version: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        wifi_rssi: Option<i32>,
        bhajan_status: PlaybackState,
        bhajan_id: i64,
        bhajan_name: String,
        bhajan_position: u32,
    },
    /// Periodic health report.
    StatusUpdate {
        device_id: String,
        timestamp: i64,
        uptime: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        wifi_rssi: Option<i32>,
        bhajan_status: PlaybackState,
        bhajan_id: i64,
        bhajan_name: String,
        bhajan_position: u32,
        bhajan_duration: u32,
        volume: u8,
    },
    BhajanDefaultSet {
        bhajan_id: i64,
        success: bool,
    },
    Pong {
        timestamp: i64,
    },
}

impl OutboundMessage {
    pub fn status(device_id: &str, snapshot: &PlaybackSnapshot) -> Self {
        OutboundMessage::BhajanStatus {
            device_id: device_id.to_string(),
            status: snapshot.state,
            bhajan_id: snapshot.track_id.0,
            bhajan_name: snapshot.name.clone(),
            position: snapshot.position,
            duration: snapshot.duration,
            volume: snapshot.volume,
        }
    }

    pub fn initial(
        device_id: &str,
        firmware_version: String,
        wifi_rssi: Option<i32>,
        snapshot: &PlaybackSnapshot,
    ) -> Self {
        OutboundMessage::InitialStatus {
            device_id: device_id.to_string(),
            firmware_version,
            wifi_rssi,
            bhajan_status: snapshot.state,
            bhajan_id: snapshot.track_id.0,
            bhajan_name: snapshot.name.clone(),
            bhajan_position: snapshot.position,
        }
    }

    pub fn update(
        device_id: &str,
        timestamp: i64,
        uptime: u64,
        wifi_rssi: Option<i32>,
        snapshot: &PlaybackSnapshot,
    ) -> Self {
        OutboundMessage::StatusUpdate {
            device_id: device_id.to_string(),
            timestamp,
            uptime,
            wifi_rssi,
            bhajan_status: snapshot.state,
            bhajan_id: snapshot.track_id.0,
            bhajan_name: snapshot.name.clone(),
            bhajan_position: snapshot.position,
            bhajan_duration: snapshot.duration,
            volume: snapshot.volume,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::BhajanStatus { .. } => "bhajan_status",
            OutboundMessage::InitialStatus { .. } => "initial_status",
            OutboundMessage::StatusUpdate { .. } => "status_update",
            OutboundMessage::BhajanDefaultSet { .. } => "bhajan_default_set",
            OutboundMessage::Pong { .. } => "pong",
        }
    }

    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
