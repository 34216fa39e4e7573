//! PCM output sink and competing audio stand-ins for desktop hosts

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playback::{AudioOutput, CompetingAudio, PcmFormat},
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Writes raw PCM blocks to a file, or discards them when no path is set.
///
/// With pacing enabled each block takes as long to write as it would take
/// to play, which keeps the wall-clock position believable on a desktop.
pub struct PcmFileOutput {
    format: PcmFormat,
    path: Option<PathBuf>,
    paced: bool,
    file: Mutex<Option<File>>,
    bytes_written: AtomicU64,
}

impl PcmFileOutput {
    /// Append blocks to `path` in the given format.
    pub fn to_file(path: impl Into<PathBuf>, format: PcmFormat) -> Self {
        Self::build(Some(path.into()), format)
    }

    /// Drop every block.
    pub fn discard(format: PcmFormat) -> Self {
        Self::build(None, format)
    }

    fn build(path: Option<PathBuf>, format: PcmFormat) -> Self {
        Self {
            format,
            path,
            paced: true,
            file: Mutex::new(None),
            bytes_written: AtomicU64::new(0),
        }
    }

    /// Disable real-time pacing.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Total bytes accepted since construction.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    fn block_duration(&self, len: usize) -> Duration {
        let bps = self.format.bytes_per_second();
        if bps == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(len as u64 * 1_000_000 / bps)
    }
}

#[async_trait]
impl AudioOutput for PcmFileOutput {
    fn format(&self) -> PcmFormat {
        self.format
    }

    async fn start(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        if file.is_some() {
            return Ok(());
        }

        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let opened = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            *file = Some(opened);
            debug!(path = ?path, "Opened PCM output file");
        }

        Ok(())
    }

    async fn write_block(&self, block: &[u8]) -> Result<()> {
        {
            let mut file = self.file.lock().await;
            if let Some(file) = file.as_mut() {
                file.write_all(block).await.map_err(BridgeError::Io)?;
            } else if self.path.is_some() {
                return Err(BridgeError::OperationFailed(
                    "PCM output written before start".to_string(),
                ));
            }
        }

        self.bytes_written
            .fetch_add(block.len() as u64, Ordering::Relaxed);

        if self.paced {
            tokio::time::sleep(self.block_duration(block.len())).await;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush().await?;
            debug!("Closed PCM output file");
        }
        Ok(())
    }
}

/// Logs suspend and resume requests for the host's other audio source.
#[derive(Default)]
pub struct DesktopCompetingAudio {
    suspended: AtomicBool,
}

impl DesktopCompetingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompetingAudio for DesktopCompetingAudio {
    fn name(&self) -> &str {
        "desktop-voice"
    }

    async fn suspend(&self) -> Result<()> {
        if !self.suspended.swap(true, Ordering::SeqCst) {
            info!(source = self.name(), "Competing audio suspended");
        }
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        if self.suspended.swap(false, Ordering::SeqCst) {
            info!(source = self.name(), "Competing audio resumed");
        }
        Ok(())
    }
}
