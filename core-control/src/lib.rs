//! # Control Channel Adapter
//!
//! Translates JSON messages from the device's control server into
//! [`PlaybackController`](core_playback::PlaybackController) commands and
//! pushes playback status back.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let channel = ControlChannel::new(transport, controller, settings, device, clock, ControlConfig::default());
//! core_async::spawn(async move { channel.run(cancel).await });
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod messages;
pub mod status;

pub use channel::ControlChannel;
pub use config::ControlConfig;
pub use error::{ControlError, Result};
pub use messages::{ControlAction, InboundMessage, PlayFields};
pub use status::OutboundMessage;

/// Settings key of the persisted default track id.
pub const DEFAULT_TRACK_KEY: &str = "default_bhajan_id";

/// Settings key of the persisted volume.
pub const VOLUME_KEY: &str = "bhajan_volume";
