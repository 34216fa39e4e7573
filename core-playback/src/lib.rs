//! # Playback Core
//!
//! Streams a remote 16-bit PCM track to a fixed-rate audio sink and exposes
//! the play/pause/resume/stop/volume surface used by the control channel and
//! the local button.
//!
//! ## Overview
//!
//! - [`PlaybackController`]: owns the [`PlaybackDescriptor`] and accepts commands
//! - [`StreamingEngine`]: fetch loop with retries, ranged reconnects and the
//!   fetch-and-play fallback onto the [`CacheStore`]
//! - [`ArbitrationLoop`]: mutes the competing audio path while playing
//! - [`InputLoop`]: debounced button to toggle
//! - [`BackendTrackResolver`]: looks up the device's default track
//!
//! ## Usage
//!
//! ```rust,ignore
//! let controller = Arc::new(PlaybackController::new(events.clone(), clock));
//! let engine = StreamingEngine::new(controller.clone(), http, output, StreamingConfig::default())
//!     .with_cache(CacheStore::new(fs, CacheConfig::default()));
//!
//! core_async::spawn(async move { engine.run(cancel).await });
//! controller.start("https://cdn.example/track.pcm", "Morning", TrackId(3)).await;
//! ```

pub mod arbitration;
pub mod cache;
pub mod config;
pub mod controller;
pub mod descriptor;
pub mod error;
pub mod input;
pub mod resolver;
pub mod streaming;
pub mod volume;

pub use arbitration::ArbitrationLoop;
pub use cache::{CacheStore, CachedTrack, StoreLimits, TrackMeta};
pub use config::{CacheConfig, LoopConfig, StreamingConfig};
pub use controller::PlaybackController;
pub use descriptor::{
    PendingRequest, PlaybackDescriptor, PlaybackSnapshot, PlaybackState, StreamRequest, TrackId,
};
pub use error::{PlaybackError, Result};
pub use input::InputLoop;
pub use resolver::{BackendTrackResolver, DefaultTrackResolver, ResolvedTrack, DEFAULT_TRACK_NAME};
pub use streaming::StreamingEngine;
