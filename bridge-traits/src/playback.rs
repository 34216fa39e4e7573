//! Playback bridge traits and supporting audio types.
//!
//! The core hands raw 16-bit PCM blocks to an [`AudioOutput`] sink running at
//! a fixed sample rate. A second audio path owned by the host (for example a
//! microphone/speaker loop) is modeled by [`CompetingAudio`] and is muted
//! while the core is playing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// PCM format accepted by the output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Bits per sample. Only 16 is produced by the core.
    pub bits_per_sample: u16,
}

impl PcmFormat {
    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Bytes consumed by one second of audio.
    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64 * (self.bits_per_sample as u64 / 8)
    }

    /// Whole seconds of audio represented by `byte_len` bytes.
    pub fn duration_secs(&self, byte_len: u64) -> u32 {
        let bps = self.bytes_per_second();
        if bps == 0 {
            return 0;
        }
        (byte_len / bps).min(u32::MAX as u64) as u32
    }
}

impl Default for PcmFormat {
    /// 44.1 kHz mono, 16-bit.
    fn default() -> Self {
        Self::new(44_100, 1, 16)
    }
}

/// Fixed-rate audio output sink.
///
/// `write_block` may block (asynchronously) until the hardware has room for
/// the block; the streaming loop relies on that back-pressure for pacing.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Format the sink was configured with.
    fn format(&self) -> PcmFormat;

    /// Prepare the output for a new stream.
    async fn start(&self) -> Result<()>;

    /// Write one block of little-endian PCM bytes.
    async fn write_block(&self, block: &[u8]) -> Result<()>;

    /// Flush and release the output.
    async fn stop(&self) -> Result<()>;
}

/// Host-owned audio path that must be silenced while the core plays.
#[async_trait]
pub trait CompetingAudio: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "competing-audio"
    }

    /// Stop the competing path's interface.
    async fn suspend(&self) -> Result<()>;

    /// Bring the competing path back.
    async fn resume(&self) -> Result<()>;
}
