//! # Streaming Configuration
//!
//! Tuning for the streaming loop, the fetch-and-play cache and the two
//! polling loops that sit beside it.

use bridge_traits::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Streaming loop configuration.
///
/// Controls block size, HTTP timeouts, retry budget and polling intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Bytes read from the body and written to the sink per iteration.
    ///
    /// Must be even so blocks never split a 16-bit sample.
    ///
    /// Default: 4096 bytes (~46ms of 44.1kHz mono).
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Maximum wait for the HTTP response headers.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Maximum wait for a single block read.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: Duration,

    /// Consecutive failed attempts before a request is abandoned.
    ///
    /// Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    ///
    /// Default: 3 seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// How often the idle loop re-checks for a pending request when no
    /// wake-up arrives.
    ///
    /// Default: 100ms.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Sleep between state checks while paused.
    ///
    /// Default: 100ms.
    #[serde(default = "default_pause_poll_interval")]
    pub pause_poll_interval: Duration,

    /// Optional bearer token for audio requests.
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
            poll_interval: default_poll_interval(),
            pause_poll_interval: default_pause_poll_interval(),
            auth_token: None,
        }
    }
}

impl StreamingConfig {
    /// Retry policy derived from the attempt budget and fixed delay.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, self.retry_delay)
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size == 0 {
            return Err("block_size must be > 0".to_string());
        }

        if self.block_size % 2 != 0 {
            return Err("block_size must be a whole number of 16-bit samples".to_string());
        }

        if self.max_attempts == 0 {
            return Err("max_attempts must be > 0".to_string());
        }

        if self.read_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err("timeouts must be > 0".to_string());
        }

        if self.poll_interval.is_zero() || self.pause_poll_interval.is_zero() {
            return Err("poll intervals must be > 0".to_string());
        }

        Ok(())
    }
}

/// Fetch-and-play cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Sub-directory of the host cache directory holding the cached track.
    ///
    /// Default: `audio`.
    #[serde(default = "default_cache_directory")]
    pub cache_directory: String,

    /// Upper bound on a downloaded track. Larger downloads are abandoned.
    ///
    /// Default: 8 MiB, sized for a small flash partition.
    #[serde(default = "default_max_track_bytes")]
    pub max_track_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_directory: default_cache_directory(),
            max_track_bytes: default_max_track_bytes(),
        }
    }
}

impl CacheConfig {
    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.cache_directory = directory.into();
        self
    }

    pub fn with_max_track_bytes(mut self, bytes: u64) -> Self {
        self.max_track_bytes = bytes;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cache_directory.trim().is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }
        if self.max_track_bytes == 0 {
            return Err("max_track_bytes must be > 0".to_string());
        }
        Ok(())
    }
}

/// Polling intervals of the arbitration and local-input loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Default: 100ms.
    #[serde(default = "default_arbitration_interval")]
    pub arbitration_interval: Duration,

    /// Default: 20ms.
    #[serde(default = "default_input_poll_interval")]
    pub input_poll_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            arbitration_interval: default_arbitration_interval(),
            input_poll_interval: default_input_poll_interval(),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.arbitration_interval.is_zero() || self.input_poll_interval.is_zero() {
            return Err("loop intervals must be > 0".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_block_size() -> usize {
    4096
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_pause_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_cache_directory() -> String {
    "audio".to_string()
}

fn default_max_track_bytes() -> u64 {
    8 * 1024 * 1024
}

fn default_arbitration_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_input_poll_interval() -> Duration {
    Duration::from_millis(20)
}
