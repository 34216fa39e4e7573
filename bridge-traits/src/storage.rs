//! Persistent storage bridges.
//!
//! Three stores with different lifetimes:
//! - [`FileSystemAccess`]: the flash area holding the single cached track
//! - [`SettingsStore`]: small preferences that survive reboots
//! - [`SecureStore`]: the backend credential

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File access for the audio cache.
///
/// Paths handed to the other methods are always below
/// [`cache_root`](Self::cache_root). The blob is moved with the streaming
/// methods so a track never has to fit in memory; the small JSON sidecar
/// uses the whole-file methods.
///
/// ```ignore
/// async fn slot(fs: &dyn FileSystemAccess) -> Result<PathBuf> {
///     let dir = fs.cache_root().await?.join("audio");
///     fs.create_dir_all(&dir).await?;
///     Ok(dir)
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Directory the host reserves for cached data.
    async fn cache_root(&self) -> Result<PathBuf>;

    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create `path` and any missing parents. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Replace the contents of `path`.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    async fn delete_file(&self, path: &Path) -> Result<()>;

    async fn open_read_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn core_async::io::AsyncRead + Send + Unpin>>;

    /// Open `path` for writing, truncating it. Data is durable only after
    /// the writer's `shutdown` completes.
    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn core_async::io::AsyncWrite + Send + Unpin>>;
}

/// Credential store. Values are opaque bytes and must never be logged.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// `Ok(None)` when nothing is stored under `key`.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn delete_secret(&self, key: &str) -> Result<()>;
}

/// Reboot-surviving preferences such as the default track and volume.
///
/// On a device this is typically an NVS namespace; writes are expected to
/// be rare and small.
///
/// ```ignore
/// store.set_i64("bhajan_volume", 80).await?;
/// assert_eq!(store.get_i64("bhajan_volume").await?, Some(80));
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// `Ok(None)` when the key is absent.
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn has_key(&self, key: &str) -> Result<bool>;
}
