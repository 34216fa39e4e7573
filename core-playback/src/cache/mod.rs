//! # Fallback Track Cache
//!
//! Single-slot local copy of the last track downloaded by the
//! fetch-and-play fallback.
//!
//! ## Overview
//!
//! The slot is two files under `<cache dir>/<cache_directory>/`:
//! - `track.pcm`: the raw PCM body exactly as served
//! - `track.json`: a [`CachedTrack`] sidecar describing it
//!
//! The sidecar is written last and removed first, so a present sidecar
//! always describes a complete blob. A body that ends short of its
//! advertised length never gets a sidecar. Each successful download overwrites the
//! slot; nothing ever invalidates it otherwise.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let store = CacheStore::new(fs, CacheConfig::default());
//!
//! let limits = StoreLimits {
//!     expected_len: response.content_length,
//!     read_timeout: Duration::from_secs(10),
//! };
//! let track = store.store(meta, response.body, limits, || true).await?;
//! let (track, reader) = store.open().await?;
//! ```

mod store;

pub use store::{CacheStore, CachedTrack, StoreLimits, TrackMeta};
