//! # Playback Descriptor
//!
//! The record of what is playing, in which state, and for how long.
//!
//! Exactly one [`PlaybackDescriptor`] exists per [`PlaybackController`]
//! and only the controller mutates it. Everyone else works with
//! [`PlaybackSnapshot`] copies.
//!
//! [`PlaybackController`]: crate::controller::PlaybackController

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend identifier of a track. `-1` means "no track".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub i64);

impl TrackId {
    pub const NONE: TrackId = TrackId(-1);

    pub fn is_none(self) -> bool {
        self.0 < 0
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<i64> for TrackId {
    fn from(value: i64) -> Self {
        TrackId(value)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback state as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared playback record owned by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackDescriptor {
    pub track_id: TrackId,
    pub name: String,
    pub source_url: String,
    pub state: PlaybackState,
    /// Elapsed playing time in whole seconds.
    pub position: u32,
    /// Track length in whole seconds, 0 when unknown.
    pub duration: u32,
    /// 0-100
    pub volume: u8,
}

impl PlaybackDescriptor {
    pub fn new(volume: u8) -> Self {
        Self {
            track_id: TrackId::NONE,
            name: String::new(),
            source_url: String::new(),
            state: PlaybackState::Stopped,
            position: 0,
            duration: 0,
            volume: volume.min(100),
        }
    }

    /// Whether a previously requested track can be replayed.
    pub fn has_source(&self) -> bool {
        !self.source_url.is_empty()
    }

    pub(crate) fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            track_id: self.track_id,
            name: self.name.clone(),
            source_url: self.source_url.clone(),
            state: self.state,
            position: self.position,
            duration: self.duration,
            volume: self.volume,
        }
    }
}

impl Default for PlaybackDescriptor {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Read-only copy of the descriptor handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub track_id: TrackId,
    pub name: String,
    pub source_url: String,
    pub state: PlaybackState,
    pub position: u32,
    pub duration: u32,
    pub volume: u8,
}

/// A playback request captured when a command arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub url: String,
    pub track_id: TrackId,
    pub name: String,
    /// Controller generation at request time; a newer command supersedes it.
    pub generation: u64,
}

/// The single request slot read by the streaming loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest {
    /// Stream directly, retrying on failure.
    Stream(StreamRequest),
    /// Stream once, then download to the cache and play the local copy.
    FetchAndPlay(StreamRequest),
}

impl PendingRequest {
    pub fn request(&self) -> &StreamRequest {
        match self {
            PendingRequest::Stream(r) | PendingRequest::FetchAndPlay(r) => r,
        }
    }

    pub fn allows_fallback(&self) -> bool {
        matches!(self, PendingRequest::FetchAndPlay(_))
    }
}
