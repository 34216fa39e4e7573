//! Cache storage on the host file system

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Simulated flash partition backed by a host directory.
///
/// The root defaults to `<platform cache dir>/device-audio` and is created
/// lazily the first time the core asks for it.
pub struct TokioFileSystem {
    root: PathBuf,
}

impl TokioFileSystem {
    pub fn new() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self::with_cache_directory(base.join("device-audio"))
    }

    pub fn with_cache_directory(root: PathBuf) -> Self {
        Self { root }
    }

    async fn prepare_parent(path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) => fs::create_dir_all(parent).await.map_err(BridgeError::Io),
            None => Ok(()),
        }
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn cache_root(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(BridgeError::Io)?;
        Ok(self.root.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(BridgeError::Io)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(BridgeError::Io)
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await.map_err(BridgeError::Io)?;
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        Self::prepare_parent(path).await?;
        fs::write(path, &data).await.map_err(BridgeError::Io)?;
        debug!(path = ?path, bytes = data.len(), "File written");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn open_read_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn core_async::io::AsyncRead + Send + Unpin>> {
        let file = fs::File::open(path).await.map_err(BridgeError::Io)?;
        Ok(Box::new(file))
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn core_async::io::AsyncWrite + Send + Unpin>> {
        Self::prepare_parent(path).await?;
        let file = fs::File::create(path).await.map_err(BridgeError::Io)?;
        debug!(path = ?path, "Write stream opened");
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_async::io::{AsyncReadExt, AsyncWriteExt};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join("device-audio-fs-tests")
            .join(format!("{}-{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_root_is_created_on_demand() {
        let root = scratch("root");
        let _ = fs::remove_dir_all(&root).await;
        let storage = TokioFileSystem::with_cache_directory(root.clone());

        assert_eq!(storage.cache_root().await.unwrap(), root);
        assert!(storage.exists(&root).await.unwrap());
    }

    #[tokio::test]
    async fn test_sidecar_write_read_delete() {
        let root = scratch("sidecar");
        let storage = TokioFileSystem::with_cache_directory(root.clone());
        let sidecar = root.join("audio").join("track.json");

        let data = Bytes::from_static(b"{\"track_id\":7}");
        storage.write_file(&sidecar, data.clone()).await.unwrap();
        assert_eq!(storage.read_file(&sidecar).await.unwrap(), data);

        storage.delete_file(&sidecar).await.unwrap();
        assert!(!storage.exists(&sidecar).await.unwrap());
        // Deleting twice is fine.
        storage.delete_file(&sidecar).await.unwrap();
    }

    #[tokio::test]
    async fn test_blob_streams() {
        let root = scratch("blob");
        let storage = TokioFileSystem::with_cache_directory(root.clone());
        let blob = root.join("audio").join("track.pcm");

        let mut writer = storage.open_write_stream(&blob).await.unwrap();
        writer.write_all(&[1, 2, 3, 4]).await.unwrap();
        writer.shutdown().await.unwrap();

        let mut reader = storage.open_read_stream(&blob).await.unwrap();
        let mut pcm = Vec::new();
        reader.read_to_end(&mut pcm).await.unwrap();
        assert_eq!(pcm, vec![1, 2, 3, 4]);
    }
}
