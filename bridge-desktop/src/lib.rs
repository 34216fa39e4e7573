//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts, used to run
//! the device audio core as a simulator on macOS, Windows and Linux.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `SecureStore` using the `keyring` crate
//! - `SettingsStore` using a SQLite-backed key-value store
//! - `AudioOutput` writing raw PCM to a file (or discarding it)
//! - `ControlTransport` as newline-delimited JSON over TCP
//! - `CompetingAudio`, `FeedbackIndicator`, `ButtonInput` and `DeviceInfo`
//!   as logging or programmatic stand-ins
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{PcmFileOutput, ReqwestHttpClient, TcpControlTransport};
//! use bridge_traits::PcmFormat;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http = ReqwestHttpClient::new("ESP32-Bhajan-Player/1.0")?;
//!     let output = PcmFileOutput::to_file("/tmp/out.pcm", PcmFormat::default());
//!     let transport = TcpControlTransport::spawn("127.0.0.1:8765", Duration::from_secs(5));
//!     // Hand these to DeviceConfig::builder()
//!     Ok(())
//! }
//! ```

mod audio;
mod control;
mod device;
mod filesystem;
mod http;
mod settings;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use audio::{DesktopCompetingAudio, PcmFileOutput};
pub use control::TcpControlTransport;
pub use device::{ManualButton, StaticDeviceInfo, TracingFeedback};
pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
