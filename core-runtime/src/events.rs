//! # Events
//!
//! Typed notifications from the playback core to its observers over a
//! `tokio::sync::broadcast` channel.
//!
//! ```text
//! ┌─────────────────────┐  emit   ┌───────────┐  subscribe  ┌──────────────────┐
//! │ PlaybackController  ├────────>│           ├────────────>│ ControlChannel   │
//! └─────────────────────┘         │ EventBus  │             │ (status pushes)  │
//! ┌─────────────────────┐  emit   │           │  subscribe  ┌──────────────────┐
//! │ StreamingEngine     ├────────>│           ├────────────>│ host / tests     │
//! └─────────────────────┘         └───────────┘             └──────────────────┘
//! ```
//!
//! Emitting never blocks and never fails the caller in a way that matters:
//! with no subscribers `emit` returns an error that producers ignore.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(32);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Stopped { track_id: 7 })).ok();
//! assert!(rx.recv().await.unwrap().is_status_change());
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Per-subscriber backlog of [`EventBus::default`]. A subscriber further
/// behind gets `RecvError::Lagged` on its next receive.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

/// Everything published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Control(ControlEvent),
}

impl CoreEvent {
    /// Whether observers should publish a fresh status snapshot.
    pub fn is_status_change(&self) -> bool {
        matches!(self, CoreEvent::Playback(e) if e.is_status_change())
    }
}

/// Playback transitions. Track ids use `-1` for "no track".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new track was requested; the stream has not started yet.
    Requested {
        track_id: i64,
        name: String,
        /// Whether the request may fall back to a cached download.
        fallback: bool,
    },
    /// The streaming loop picked the request up and is now Playing.
    Started { track_id: i64, name: String },
    Paused { track_id: i64, position_secs: u32 },
    Resumed { track_id: i64, position_secs: u32 },
    /// Explicit stop.
    Stopped { track_id: i64 },
    /// Body exhausted while Playing.
    Completed { track_id: i64 },
    VolumeChanged { volume: u8 },
    /// A retryable fetch failure; another attempt follows.
    Retrying {
        track_id: i64,
        attempt: u32,
        reason: String,
    },
    /// The direct stream failed; the track is being downloaded to the cache.
    FallbackEngaged { track_id: i64 },
    /// The request was abandoned and playback is Stopped.
    Failed {
        track_id: i64,
        message: String,
        attempts: u32,
    },
}

impl PlaybackEvent {
    /// Events that change the externally reported status.
    pub fn is_status_change(&self) -> bool {
        !matches!(
            self,
            PlaybackEvent::Retrying { .. } | PlaybackEvent::FallbackEngaged { .. }
        )
    }
}

/// Control-channel lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ControlEvent {
    Connected,
    Disconnected,
    /// The server assigned the identifier used in outbound messages.
    DeviceIdentified { device_id: String },
    /// A new default track was persisted.
    DefaultTrackChanged { track_id: i64 },
}

/// Broadcast hub shared by producers and observers.
///
/// Clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Deliver to every current subscriber. Errors only when there are
    /// none, which producers treat as success.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New receiver; sees only events emitted after this call.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
