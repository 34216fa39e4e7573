use crate::config::CacheConfig;
use crate::descriptor::TrackId;
use crate::error::{PlaybackError, Result};
use bridge_traits::FileSystemAccess;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_async::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use core_async::time::timeout;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const BLOB_FILE: &str = "track.pcm";
const SIDECAR_FILE: &str = "track.json";
const COPY_CHUNK: usize = 16 * 1024;

/// Identity of the track being stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMeta {
    pub track_id: TrackId,
    pub name: String,
    pub source_url: String,
}

/// Bounds applied while copying a download into the slot.
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    /// Advertised body length, when the server sent one.
    pub expected_len: Option<u64>,
    /// Bound on each read from the body.
    pub read_timeout: Duration,
}

/// Sidecar record of the cached blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTrack {
    pub track_id: TrackId,
    pub name: String,
    pub source_url: String,
    pub byte_len: u64,
    pub stored_at: DateTime<Utc>,
}

/// Single-slot cache backed by [`FileSystemAccess`].
pub struct CacheStore {
    fs: Arc<dyn FileSystemAccess>,
    config: CacheConfig,
}

impl CacheStore {
    pub fn new(fs: Arc<dyn FileSystemAccess>, config: CacheConfig) -> Self {
        Self { fs, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    async fn slot_dir(&self) -> Result<PathBuf> {
        let base = self
            .fs
            .cache_root()
            .await
            .map_err(|e| PlaybackError::CacheUnavailable(format!("no cache directory: {}", e)))?;
        Ok(base.join(&self.config.cache_directory))
    }

    /// Copy `body` into the slot, replacing whatever was there.
    ///
    /// `keep_going` is checked between chunks; returning `false` abandons the
    /// download and yields `Ok(None)`. A body that ends before
    /// `limits.expected_len` is [`PlaybackError::DecodeShortfall`] and leaves
    /// the slot empty.
    #[instrument(skip(self, body, limits, keep_going), fields(track_id = %meta.track_id))]
    pub async fn store<R, F>(
        &self,
        meta: TrackMeta,
        mut body: R,
        limits: StoreLimits,
        keep_going: F,
    ) -> Result<Option<CachedTrack>>
    where
        R: AsyncRead + Send + Unpin,
        F: Fn() -> bool + Send,
    {
        let dir = self.slot_dir().await?;
        self.fs
            .create_dir_all(&dir)
            .await
            .map_err(|e| PlaybackError::CacheUnavailable(format!("create {:?}: {}", dir, e)))?;

        let sidecar = dir.join(SIDECAR_FILE);
        if self.fs.exists(&sidecar).await.unwrap_or(false) {
            self.fs
                .delete_file(&sidecar)
                .await
                .map_err(|e| PlaybackError::CacheUnavailable(format!("clear sidecar: {}", e)))?;
        }

        let blob = dir.join(BLOB_FILE);
        let mut writer = self
            .fs
            .open_write_stream(&blob)
            .await
            .map_err(|e| PlaybackError::CacheUnavailable(format!("open {:?}: {}", blob, e)))?;

        let read_timeout = limits.read_timeout;
        let mut chunk = vec![0u8; COPY_CHUNK];
        let mut byte_len: u64 = 0;
        loop {
            if !keep_going() {
                debug!(byte_len, "Download abandoned");
                return Ok(None);
            }

            let n = match timeout(read_timeout, body.read(&mut chunk)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(PlaybackError::ConnectFailed(e.to_string())),
                Err(_) => return Err(PlaybackError::ReadTimeout(read_timeout.as_millis() as u64)),
            };
            if n == 0 {
                break;
            }

            byte_len += n as u64;
            if byte_len > self.config.max_track_bytes {
                warn!(
                    limit = self.config.max_track_bytes,
                    "Track exceeds cache capacity"
                );
                return Err(PlaybackError::CacheUnavailable(format!(
                    "track larger than {} bytes",
                    self.config.max_track_bytes
                )));
            }

            writer
                .write_all(&chunk[..n])
                .await
                .map_err(|e| PlaybackError::CacheUnavailable(format!("write failed: {}", e)))?;
        }

        writer
            .shutdown()
            .await
            .map_err(|e| PlaybackError::CacheUnavailable(format!("flush failed: {}", e)))?;

        if let Some(expected) = limits.expected_len {
            if byte_len < expected {
                warn!(byte_len, expected, "Download ended early, not caching");
                return Err(PlaybackError::DecodeShortfall {
                    delivered: byte_len,
                    expected,
                });
            }
        }

        let track = CachedTrack {
            track_id: meta.track_id,
            name: meta.name,
            source_url: meta.source_url,
            byte_len,
            stored_at: Utc::now(),
        };
        let json = serde_json::to_vec(&track)
            .map_err(|e| PlaybackError::CacheUnavailable(format!("encode sidecar: {}", e)))?;
        self.fs
            .write_file(&sidecar, Bytes::from(json))
            .await
            .map_err(|e| PlaybackError::CacheUnavailable(format!("write sidecar: {}", e)))?;

        info!(byte_len, "Track cached");
        Ok(Some(track))
    }

    /// Sidecar of the cached track, if the slot holds a complete one.
    pub async fn metadata(&self) -> Result<Option<CachedTrack>> {
        let sidecar = self.slot_dir().await?.join(SIDECAR_FILE);
        if !self.fs.exists(&sidecar).await.unwrap_or(false) {
            return Ok(None);
        }

        let raw = self
            .fs
            .read_file(&sidecar)
            .await
            .map_err(|e| PlaybackError::CacheUnavailable(format!("read sidecar: {}", e)))?;
        match serde_json::from_slice(&raw) {
            Ok(track) => Ok(Some(track)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cache sidecar");
                Ok(None)
            }
        }
    }

    /// Open the cached blob for playback.
    pub async fn open(&self) -> Result<(CachedTrack, Box<dyn AsyncRead + Send + Unpin>)> {
        let track = self
            .metadata()
            .await?
            .ok_or_else(|| PlaybackError::CacheUnavailable("cache slot is empty".to_string()))?;

        let blob = self.slot_dir().await?.join(BLOB_FILE);
        let reader = self
            .fs
            .open_read_stream(&blob)
            .await
            .map_err(|e| PlaybackError::CacheUnavailable(format!("open {:?}: {}", blob, e)))?;

        Ok((track, reader))
    }
}
