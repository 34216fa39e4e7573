//! Core service bootstrap.
//!
//! This crate wires a validated [`DeviceConfig`] into the playback core and
//! starts its long-lived tasks:
//!
//! - the streaming loop ([`StreamingEngine`])
//! - the control loop ([`ControlChannel`])
//! - the arbitration loop, when a [`CompetingAudio`](bridge_traits::CompetingAudio) path is configured
//! - the local-input loop, when a [`ButtonInput`](bridge_traits::ButtonInput) is configured
//!
//! Persisted state (default track, volume, backend credential) is read once
//! here, before any task runs.
//!
//! ```ignore
//! let config = DeviceConfig::builder()
//!     .audio_output(output)
//!     .control_transport(transport)
//!     .device_info(device)
//!     .build()?;
//! let service = core_service::bootstrap(config, ServiceOptions::default()).await?;
//! service.play_default().await;
//! service.shutdown().await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{SecureStore, SettingsStore};
use core_async::sync::CancellationToken;
use core_async::task::JoinSet;
use core_control::{ControlChannel, ControlConfig, DEFAULT_TRACK_KEY, VOLUME_KEY};
use core_playback::{
    ArbitrationLoop, BackendTrackResolver, CacheConfig, CacheStore, InputLoop, LoopConfig,
    PlaybackController, StreamingConfig, StreamingEngine, TrackId,
};
use core_runtime::config::DeviceConfig;
use core_runtime::events::EventBus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Secure-store key of the backend credential.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Tuning for every component the service starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOptions {
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub loops: LoopConfig,
    #[serde(default)]
    pub control: ControlConfig,
    /// Events buffered per subscriber before it lags.
    ///
    /// Default: 100.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            streaming: StreamingConfig::default(),
            cache: CacheConfig::default(),
            loops: LoopConfig::default(),
            control: ControlConfig::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl ServiceOptions {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("streaming", self.streaming.validate()),
            ("cache", self.cache.validate()),
            ("loops", self.loops.validate()),
            ("control", self.control.validate()),
        ];
        for (section, result) in checks {
            result.map_err(|e| CoreError::InvalidOptions(format!("{}: {}", section, e)))?;
        }
        if self.event_buffer == 0 {
            return Err(CoreError::InvalidOptions(
                "event_buffer must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_event_buffer() -> usize {
    100
}

/// State restored from the host stores at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PersistedState {
    default_track: TrackId,
    volume: u8,
    auth_token: Option<String>,
}

async fn load_persisted(
    settings: &dyn SettingsStore,
    secure: Option<&dyn SecureStore>,
) -> PersistedState {
    let default_track = match settings.get_i64(DEFAULT_TRACK_KEY).await {
        Ok(Some(id)) if id > 0 => TrackId(id),
        Ok(_) => TrackId::NONE,
        Err(e) => {
            warn!(error = %e, "Could not read default track");
            TrackId::NONE
        }
    };

    let volume = match settings.get_i64(VOLUME_KEY).await {
        Ok(Some(v)) if (0..=100).contains(&v) => v as u8,
        Ok(Some(v)) => {
            warn!(volume = v, "Ignoring out-of-range persisted volume");
            100
        }
        Ok(None) => 100,
        Err(e) => {
            warn!(error = %e, "Could not read volume");
            100
        }
    };

    let auth_token = match secure {
        Some(store) => match store.get_secret(AUTH_TOKEN_KEY).await {
            Ok(Some(bytes)) => String::from_utf8(bytes).ok().filter(|t| !t.is_empty()),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Could not read backend credential");
                None
            }
        },
        None => None,
    };

    PersistedState {
        default_track,
        volume,
        auth_token,
    }
}

/// Handle to a running playback core.
pub struct CoreService {
    controller: Arc<PlaybackController>,
    events: EventBus,
    device_id: String,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

/// Build every component from `config` and start the long-lived tasks.
///
/// Must be called from within a tokio runtime.
pub async fn bootstrap(config: DeviceConfig, options: ServiceOptions) -> Result<CoreService> {
    options.validate()?;
    if core_async::runtime::Handle::try_current().is_err() {
        return Err(CoreError::InitializationFailed(
            "bootstrap must run inside a tokio runtime".to_string(),
        ));
    }

    let persisted =
        load_persisted(config.settings_store.as_ref(), config.secure_store.as_deref()).await;
    info!(
        device_id = %config.device_id,
        default_track = %persisted.default_track,
        volume = persisted.volume,
        has_token = persisted.auth_token.is_some(),
        "Bootstrapping playback core"
    );

    let events = EventBus::new(options.event_buffer);
    let mut controller = PlaybackController::new(events.clone(), config.clock.clone())
        .with_initial_volume(persisted.volume)
        .with_default_track(persisted.default_track);
    if let Some(feedback) = &config.feedback {
        controller = controller.with_feedback(feedback.clone());
    }
    match &config.backend_base_url {
        Some(base_url) => {
            let resolver = BackendTrackResolver::new(
                config.http_client.clone(),
                base_url.clone(),
                config.device_info.mac_address(),
                config.user_agent.clone(),
            )
            .with_auth_token(persisted.auth_token.clone());
            controller = controller.with_resolver(Arc::new(resolver));
        }
        None => debug!("No backend configured, default track resolution disabled"),
    }
    let controller = Arc::new(controller);

    let cache = CacheStore::new(config.file_system.clone(), options.cache.clone());
    let engine = StreamingEngine::new(
        controller.clone(),
        config.http_client.clone(),
        config.audio_output.clone(),
        options.streaming.clone(),
    )
    .with_cache(cache)
    .with_user_agent(config.user_agent.clone());

    let mut channel = ControlChannel::new(
        config.control_transport.clone(),
        controller.clone(),
        config.settings_store.clone(),
        config.device_info.clone(),
        config.clock.clone(),
        options.control.clone(),
    )
    .with_device_id(config.device_id.clone());
    if let Some(handler) = &config.generic_handler {
        channel = channel.with_generic_handler(handler.clone());
    }

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let token = cancel.clone();
    tasks.spawn(async move { engine.run(token).await });

    let token = cancel.clone();
    tasks.spawn(async move { channel.run(token).await });

    match &config.competing_audio {
        Some(competing) => {
            let arbitration = ArbitrationLoop::new(
                controller.clone(),
                competing.clone(),
                options.loops.arbitration_interval,
            );
            let token = cancel.clone();
            tasks.spawn(async move { arbitration.run(token).await });
        }
        None => debug!("No competing audio path, arbitration loop not started"),
    }

    match &config.button {
        Some(button) => {
            let input = InputLoop::new(
                controller.clone(),
                button.clone(),
                options.loops.input_poll_interval,
            );
            let token = cancel.clone();
            tasks.spawn(async move { input.run(token).await });
        }
        None => debug!("No button input, local-input loop not started"),
    }

    info!(tasks = tasks.len(), "Playback core started");

    Ok(CoreService {
        controller,
        events,
        device_id: config.device_id,
        cancel,
        tasks,
    })
}

impl CoreService {
    /// Command surface shared with the control channel.
    pub fn controller(&self) -> Arc<PlaybackController> {
        Arc::clone(&self.controller)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Number of long-lived tasks still running.
    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Resolve and play the device's default track.
    pub async fn play_default(&self) {
        self.controller.play_default_track().await;
    }

    /// Stop playback, cancel every task and wait for them to finish.
    pub async fn shutdown(mut self) {
        info!("Shutting down playback core");
        self.controller.stop().await;
        self.cancel.cancel();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Task ended abnormally");
            }
        }
        info!("Playback core stopped");
    }
}
