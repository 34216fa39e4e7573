//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the
//! platform it runs on. Each trait represents a capability the core requires
//! but that is implemented differently per host (device firmware, desktop
//! simulator).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Buffered and streamed HTTP GETs
//! - [`ControlTransport`](control::ControlTransport) - Always-on control connection
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Local cache storage
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Backend credential
//! - [`SettingsStore`](storage::SettingsStore) - Persisted device preferences
//!
//! ### Audio
//! - [`AudioOutput`](playback::AudioOutput) - Fixed-rate PCM sink
//! - [`CompetingAudio`](playback::CompetingAudio) - Host audio path muted during playback
//!
//! ### Peripherals
//! - [`ButtonInput`](device::ButtonInput) - Debounced local button
//! - [`FeedbackIndicator`](device::FeedbackIndicator) - Transition acknowledgments
//! - [`DeviceInfo`](device::DeviceInfo) - Hardware address and firmware version
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//! - [`GenericMessageHandler`](control::GenericMessageHandler) - Control messages the core does not own
//!
//! ## Platform Requirements
//!
//! | Host     | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Simulator |
//! | Device   | firmware adapter    | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let http_client = builder.http_client
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "HttpClient".to_string(),
//!         message: "No HTTP client implementation provided.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations convert platform-specific errors and keep network failures
//! ([`BridgeError::ConnectionFailed`], [`BridgeError::Timeout`]) distinct so
//! the core can decide what to retry.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across the
//! core's long-lived tasks.

pub mod control;
pub mod device;
pub mod error;
pub mod http;
pub mod log;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use control::{ControlTransport, GenericMessageHandler, TransportEvent};
pub use device::{ButtonInput, DeviceInfo, FeedbackCue, FeedbackIndicator};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStream, RetryPolicy};
pub use playback::{AudioOutput, CompetingAudio, PcmFormat};
pub use storage::{FileSystemAccess, SecureStore, SettingsStore};
pub use log::{LogEntry, LogLevel, LoggerSink};
pub use time::{Clock, SystemClock};
