//! # Playback Error Types
//!
//! Failures of the streaming, caching and command paths. None of these is
//! returned to the issuer of a playback command; they end up in logs and in
//! terminal `Failed` events.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Fetch Errors
    // ========================================================================
    /// The HTTP connection could not be established.
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// The server answered with a status other than 200 (or 206 on a ranged
    /// reconnect).
    #[error("HTTP status error: {0}")]
    HttpStatus(u16),

    /// No bytes arrived within the read timeout.
    #[error("Read timed out after {0}ms")]
    ReadTimeout(u64),

    /// The body ended before the advertised length was delivered.
    #[error("Stream ended early: {delivered} of {expected} bytes")]
    DecodeShortfall { delivered: u64, expected: u64 },

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Local storage cannot hold or serve the cached track.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// A command was malformed or out of range.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// No playable track is known.
    #[error("No track to play: {0}")]
    NoTrack(String),

    // ========================================================================
    // Platform Errors
    // ========================================================================
    /// The audio sink rejected a block.
    #[error("Audio output error: {0}")]
    Output(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    /// Returns `true` if the fetch loop may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlaybackError::ConnectFailed(_)
                | PlaybackError::HttpStatus(_)
                | PlaybackError::ReadTimeout(_)
                | PlaybackError::DecodeShortfall { .. }
        )
    }

    /// Classify a bridge failure raised while opening or reading a stream.
    ///
    /// Every failure on the fetch path counts as a connection failure so
    /// that it is retried.
    pub(crate) fn from_fetch(error: BridgeError) -> Self {
        match error {
            BridgeError::ConnectionFailed(msg) | BridgeError::NotAvailable(msg) => {
                PlaybackError::ConnectFailed(msg)
            }
            other => PlaybackError::ConnectFailed(other.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PlaybackError::HttpStatus(503).is_retryable());
        assert!(PlaybackError::ReadTimeout(10_000).is_retryable());
        assert!(PlaybackError::DecodeShortfall {
            delivered: 10,
            expected: 20
        }
        .is_retryable());
        assert!(!PlaybackError::CacheUnavailable("no flash".into()).is_retryable());
        assert!(!PlaybackError::InvalidCommand("bad".into()).is_retryable());
        assert!(!PlaybackError::Output("i2s".into()).is_retryable());
    }

    #[test]
    fn test_fetch_error_mapping() {
        let err = PlaybackError::from_fetch(BridgeError::ConnectionFailed("refused".into()));
        assert!(matches!(err, PlaybackError::ConnectFailed(_)));

        let err = PlaybackError::from_fetch(BridgeError::Timeout("10s".into()));
        assert!(err.is_retryable());
    }
}
