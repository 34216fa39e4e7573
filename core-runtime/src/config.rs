//! # Device Configuration Module
//!
//! Provides the bootstrap configuration for the device audio core.
//!
//! ## Overview
//!
//! A builder collects the device identity, backend location and every host
//! bridge the core needs, then validates the result before any task is
//! started. Missing required bridges are reported as
//! [`Error::CapabilityMissing`] with an actionable message.
//!
//! ## Required Dependencies
//!
//! - `AudioOutput` - PCM sink the streaming loop writes into
//! - `ControlTransport` - Always-on control connection
//! - `DeviceInfo` - Hardware address and firmware version
//! - `SettingsStore` - Persisted default track and volume
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - Streaming fetches (desktop default: reqwest)
//! - `FileSystemAccess` - Cache storage (desktop default: tokio fs)
//! - `SecureStore` - Backend credential (desktop default: keyring)
//! - `Clock` - Time source (default: system clock)
//! - `CompetingAudio`, `FeedbackIndicator`, `ButtonInput`,
//!   `GenericMessageHandler` - Peripherals, skipped when absent
//!
//! When the `desktop-shims` feature is enabled, desktop defaults for
//! `HttpClient`, `FileSystemAccess`, `SecureStore` and `SettingsStore` are
//! injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::DeviceConfig;
//! use std::sync::Arc;
//!
//! let config = DeviceConfig::builder()
//!     .backend_base_url("https://api.example.com")
//!     .audio_output(Arc::new(MyI2sOutput::new()))
//!     .control_transport(Arc::new(MySocket::connect(url)))
//!     .device_info(Arc::new(MyBoardInfo))
//!     .settings_store(Arc::new(MyNvsSettings))
//!     .http_client(Arc::new(MyHttpClient))
//!     .file_system(Arc::new(MyFlashFs))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AudioOutput, ButtonInput, Clock, CompetingAudio, ControlTransport, DeviceInfo,
    FeedbackIndicator, FileSystemAccess, GenericMessageHandler, HttpClient, SecureStore,
    SettingsStore, SystemClock,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default `User-Agent` sent with every backend and audio request.
pub const DEFAULT_USER_AGENT: &str = "ESP32-Bhajan-Player/1.0";

/// Bootstrap configuration for the device audio core.
///
/// Use [`DeviceConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct DeviceConfig {
    /// Identifier used in outbound messages until the server assigns one.
    pub device_id: String,

    /// Base URL of the backend API used to resolve the default track.
    pub backend_base_url: Option<String>,

    /// Directory holding persistent device state (desktop settings database).
    pub data_dir: PathBuf,

    /// `User-Agent` header for HTTP requests
    pub user_agent: String,

    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub secure_store: Option<Arc<dyn SecureStore>>,
    pub clock: Arc<dyn Clock>,
    pub audio_output: Arc<dyn AudioOutput>,
    pub control_transport: Arc<dyn ControlTransport>,
    pub device_info: Arc<dyn DeviceInfo>,
    pub competing_audio: Option<Arc<dyn CompetingAudio>>,
    pub feedback: Option<Arc<dyn FeedbackIndicator>>,
    pub button: Option<Arc<dyn ButtonInput>>,
    pub generic_handler: Option<Arc<dyn GenericMessageHandler>>,
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn present<T: ?Sized>(value: &Option<Arc<T>>) -> &'static str {
            if value.is_some() {
                "Some(..)"
            } else {
                "None"
            }
        }

        f.debug_struct("DeviceConfig")
            .field("device_id", &self.device_id)
            .field("backend_base_url", &self.backend_base_url)
            .field("data_dir", &self.data_dir)
            .field("user_agent", &self.user_agent)
            .field("secure_store", &present(&self.secure_store))
            .field("competing_audio", &present(&self.competing_audio))
            .field("feedback", &present(&self.feedback))
            .field("button", &present(&self.button))
            .field("generic_handler", &present(&self.generic_handler))
            .finish_non_exhaustive()
    }
}

impl DeviceConfig {
    pub fn builder() -> DeviceConfigBuilder {
        DeviceConfigBuilder::default()
    }

    /// Validates the configuration values.
    ///
    /// This checks:
    /// - Device identifier is not empty
    /// - Backend URL, when set, is an absolute http(s) URL
    /// - User agent is not empty
    pub fn validate(&self) -> Result<()> {
        if self.device_id.trim().is_empty() {
            return Err(Error::Config("Device identifier cannot be empty".to_string()));
        }

        if let Some(url) = &self.backend_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "Backend base URL must start with http:// or https://, got '{}'",
                    url
                )));
            }
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("User agent cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(user_agent: &str) -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::new(user_agent).map_err(|e| {
        Error::Internal(format!("Failed to build default HttpClient: {}", e))
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_user_agent: &str) -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "No HTTP client implementation provided. \
         Desktop: enable the 'desktop-shims' feature. \
         Device: inject the firmware HTTP adapter.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing(
        "FileSystemAccess",
        "No file system implementation provided. \
         Desktop: enable the 'desktop-shims' feature. \
         Device: inject the flash file system adapter.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Option<Arc<dyn SecureStore>> {
    Some(Arc::new(bridge_desktop::KeyringSecureStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Option<Arc<dyn SecureStore>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(data_dir: &Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use core_async::runtime::{Handle, Runtime};
    use std::thread;

    let path = data_dir.join("settings.db");

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // A runtime cannot be nested inside another one's worker thread.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_data_dir: &Path) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing(
        "SettingsStore",
        "SettingsStore implementation is required to persist the default track and volume. \
         Desktop: enable the 'desktop-shims' feature to use SqliteSettingsStore. \
         Device: inject the NVS preferences adapter.",
    ))
}

fn default_data_dir() -> PathBuf {
    std::env::temp_dir().join("device-audio")
}

/// Builder for constructing [`DeviceConfig`] instances.
#[derive(Default)]
pub struct DeviceConfigBuilder {
    device_id: Option<String>,
    backend_base_url: Option<String>,
    data_dir: Option<PathBuf>,
    user_agent: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    clock: Option<Arc<dyn Clock>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    control_transport: Option<Arc<dyn ControlTransport>>,
    device_info: Option<Arc<dyn DeviceInfo>>,
    competing_audio: Option<Arc<dyn CompetingAudio>>,
    feedback: Option<Arc<dyn FeedbackIndicator>>,
    button: Option<Arc<dyn ButtonInput>>,
    generic_handler: Option<Arc<dyn GenericMessageHandler>>,
}

impl DeviceConfigBuilder {
    /// Sets the device identifier.
    ///
    /// Default: the hardware address reported by [`DeviceInfo`].
    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    /// Sets the backend base URL (e.g. `https://api.example.com`).
    pub fn backend_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.backend_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    /// Sets the directory for persistent device state.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Overrides the HTTP `User-Agent` header.
    ///
    /// Default: [`DEFAULT_USER_AGENT`]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    pub fn control_transport(mut self, transport: Arc<dyn ControlTransport>) -> Self {
        self.control_transport = Some(transport);
        self
    }

    pub fn device_info(mut self, info: Arc<dyn DeviceInfo>) -> Self {
        self.device_info = Some(info);
        self
    }

    pub fn competing_audio(mut self, audio: Arc<dyn CompetingAudio>) -> Self {
        self.competing_audio = Some(audio);
        self
    }

    pub fn feedback(mut self, feedback: Arc<dyn FeedbackIndicator>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn button(mut self, button: Arc<dyn ButtonInput>) -> Self {
        self.button = Some(button);
        self
    }

    pub fn generic_handler(mut self, handler: Arc<dyn GenericMessageHandler>) -> Self {
        self.generic_handler = Some(handler);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge has no
    ///   implementation and no platform default applies
    /// - [`Error::Config`] when a value fails validation
    pub fn build(self) -> Result<DeviceConfig> {
        let audio_output = self.audio_output.ok_or_else(|| {
            capability_missing(
                "AudioOutput",
                "An AudioOutput implementation is required to play PCM blocks. \
                 Desktop: use bridge_desktop::PcmFileOutput. \
                 Device: inject the I2S output adapter.",
            )
        })?;

        let control_transport = self.control_transport.ok_or_else(|| {
            capability_missing(
                "ControlTransport",
                "A ControlTransport implementation is required for remote control. \
                 Desktop: use bridge_desktop::TcpControlTransport. \
                 Device: inject the WebSocket adapter.",
            )
        })?;

        let device_info = self.device_info.ok_or_else(|| {
            capability_missing(
                "DeviceInfo",
                "A DeviceInfo implementation is required to identify the device. \
                 Desktop: use bridge_desktop::StaticDeviceInfo.",
            )
        })?;

        let data_dir = self.data_dir.unwrap_or_else(default_data_dir);
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(&user_agent)?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&data_dir)?,
        };

        let secure_store = self.secure_store.or_else(provide_default_secure_store);

        let device_id = self
            .device_id
            .unwrap_or_else(|| device_info.mac_address());

        let config = DeviceConfig {
            device_id,
            backend_base_url: self.backend_base_url,
            data_dir,
            user_agent,
            http_client,
            file_system,
            settings_store,
            secure_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            audio_output,
            control_transport,
            device_info,
            competing_audio: self.competing_audio,
            feedback: self.feedback,
            button: self.button,
            generic_handler: self.generic_handler,
        };

        config.validate()?;
        Ok(config)
    }
}
