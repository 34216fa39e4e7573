//! # Inbound Control Messages
//!
//! Frames are JSON objects discriminated by their `type` field. Kinds the
//! playback core acts on parse into [`InboundMessage`] variants; every other
//! kind is kept as [`InboundMessage::Other`] for the host's generic handler.
//!
//! | `type`                                   | variant                 |
//! |------------------------------------------|-------------------------|
//! | `bhajan_play`, `play`                    | [`InboundMessage::Play`] |
//! | `bhajan_control`, `pause`, `resume`, `stop` | [`InboundMessage::Control`] |
//! | `bhajan_set_default`, `set_default`      | [`InboundMessage::SetDefault`] |
//! | `bhajan_get_status`, `get_status`        | [`InboundMessage::GetStatus`] |
//! | `volume`                                 | [`InboundMessage::Volume`] |
//! | `auth_success`                           | [`InboundMessage::AuthSuccess`] |
//! | `ping`                                   | [`InboundMessage::Ping`] |

use crate::error::{ControlError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Optional fields of a play request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlayFields {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bhajan_id: Option<i64>,
}

impl PlayFields {
    /// The url, if present and non-empty.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Track id, `-1` when absent.
    pub fn track_id(&self) -> i64 {
        self.bhajan_id.unwrap_or(-1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Play,
    Pause,
    Resume,
    Stop,
}

impl ControlAction {
    pub fn parse(action: &str) -> Result<Self> {
        match action {
            "play" => Ok(ControlAction::Play),
            "pause" => Ok(ControlAction::Pause),
            "resume" => Ok(ControlAction::Resume),
            "stop" => Ok(ControlAction::Stop),
            other => Err(ControlError::InvalidCommand(format!(
                "unknown action '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Play(PlayFields),
    Control {
        action: ControlAction,
        fields: PlayFields,
    },
    SetDefault {
        bhajan_id: i64,
    },
    GetStatus,
    Volume {
        volume: i64,
    },
    AuthSuccess {
        device_id: Option<String>,
    },
    Ping,
    /// A kind the core does not own.
    Other {
        kind: String,
        body: Value,
    },
}

#[derive(Deserialize)]
struct ControlFrame {
    action: String,
    #[serde(flatten)]
    fields: PlayFields,
}

#[derive(Deserialize)]
struct SetDefaultFrame {
    #[serde(default)]
    bhajan_id: Option<i64>,
}

#[derive(Deserialize)]
struct VolumeFrame {
    volume: i64,
}

#[derive(Deserialize)]
struct AuthFrame {
    #[serde(default, rename = "deviceId")]
    device_id: Option<String>,
}

fn fields<T: for<'de> Deserialize<'de>>(kind: &str, body: Value) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| ControlError::InvalidCommand(format!("{}: {}", kind, e)))
}

impl InboundMessage {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Self> {
        let body: Value =
            serde_json::from_str(text).map_err(|e| ControlError::Malformed(e.to_string()))?;
        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ControlError::Malformed("missing string field 'type'".to_string()))?
            .to_string();

        let message = match kind.as_str() {
            "bhajan_play" | "play" => InboundMessage::Play(fields(&kind, body)?),
            "bhajan_control" => {
                let frame: ControlFrame = fields(&kind, body)?;
                InboundMessage::Control {
                    action: ControlAction::parse(&frame.action)?,
                    fields: frame.fields,
                }
            }
            "pause" | "resume" | "stop" => InboundMessage::Control {
                action: ControlAction::parse(&kind)?,
                fields: fields(&kind, body)?,
            },
            "bhajan_set_default" | "set_default" => {
                let frame: SetDefaultFrame = fields(&kind, body)?;
                InboundMessage::SetDefault {
                    bhajan_id: frame.bhajan_id.unwrap_or(-1),
                }
            }
            "bhajan_get_status" | "get_status" => InboundMessage::GetStatus,
            "volume" => {
                let frame: VolumeFrame = fields(&kind, body)?;
                InboundMessage::Volume {
                    volume: frame.volume,
                }
            }
            "auth_success" => {
                let frame: AuthFrame = fields(&kind, body)?;
                InboundMessage::AuthSuccess {
                    device_id: frame.device_id,
                }
            }
            "ping" => InboundMessage::Ping,
            _ => InboundMessage::Other { kind, body },
        };

        Ok(message)
    }
}
