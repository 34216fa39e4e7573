//! # Control Channel
//!
//! Bridges the always-on [`ControlTransport`] and the [`PlaybackController`].
//!
//! ## Overview
//!
//! One loop multiplexes four sources:
//! - transport events: connection edges and inbound frames
//! - the playback event bus: every status-worthy event pushes `bhajan_status`
//! - `status_interval`: periodic `bhajan_status`
//! - `enhanced_status_interval`: periodic `status_update`
//!
//! Outbound messages are dropped while the transport is disconnected. There
//! is no queue and no retry; the next push carries the current state anyway.
//!
//! Inbound frames that fail to parse are logged at debug and dropped.

use crate::config::ControlConfig;
use crate::error::{ControlError, Result};
use crate::messages::{ControlAction, InboundMessage, PlayFields};
use crate::status::OutboundMessage;
use crate::{DEFAULT_TRACK_KEY, VOLUME_KEY};
use bridge_traits::{
    Clock, ControlTransport, DeviceInfo, GenericMessageHandler, SettingsStore, TransportEvent,
};
use core_async::sync::CancellationToken;
use core_async::time::{interval, sleep, Duration, MissedTickBehavior};
use core_playback::{PlaybackController, PlaybackState, TrackId};
use core_runtime::events::{ControlEvent, CoreEvent, RecvError};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct ControlChannel {
    transport: Arc<dyn ControlTransport>,
    controller: Arc<PlaybackController>,
    settings: Arc<dyn SettingsStore>,
    device: Arc<dyn DeviceInfo>,
    clock: Arc<dyn Clock>,
    generic: Option<Arc<dyn GenericMessageHandler>>,
    config: ControlConfig,
    device_id: RwLock<String>,
    started_at_ms: i64,
}

impl ControlChannel {
    pub fn new(
        transport: Arc<dyn ControlTransport>,
        controller: Arc<PlaybackController>,
        settings: Arc<dyn SettingsStore>,
        device: Arc<dyn DeviceInfo>,
        clock: Arc<dyn Clock>,
        config: ControlConfig,
    ) -> Self {
        let device_id = device.mac_address();
        let started_at_ms = clock.unix_timestamp_millis();
        Self {
            transport,
            controller,
            settings,
            device,
            clock,
            generic: None,
            config,
            device_id: RwLock::new(device_id),
            started_at_ms,
        }
    }

    /// Receiver for kinds the core does not handle.
    pub fn with_generic_handler(mut self, handler: Arc<dyn GenericMessageHandler>) -> Self {
        self.generic = Some(handler);
        self
    }

    /// Identifier reported before the server assigns one.
    pub fn with_device_id(self, device_id: impl Into<String>) -> Self {
        *self.device_id.write() = device_id.into();
        self
    }

    pub fn device_id(&self) -> String {
        self.device_id.read().clone()
    }

    fn uptime_millis(&self) -> i64 {
        (self.clock.unix_timestamp_millis() - self.started_at_ms).max(0)
    }

    #[instrument(skip(self, cancel))]
    pub async fn run(&self, cancel: CancellationToken) {
        let mut events = self.controller.events().subscribe();

        let mut status_tick = interval(self.config.status_interval);
        status_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut enhanced_tick = interval(self.config.enhanced_status_interval);
        enhanced_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(device_id = %self.device_id(), "Control loop started");

        loop {
            core_async::select! {
                _ = cancel.cancelled() => break,
                event = self.transport.next_event() => match event {
                    Ok(Some(event)) => self.on_transport_event(event).await,
                    Ok(None) => {
                        info!("Control transport closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Control transport error");
                        sleep(Duration::from_millis(100)).await;
                    }
                },
                event = events.recv() => match event {
                    Ok(CoreEvent::Playback(event)) if event.is_status_change() => {
                        self.send_status().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Status pump lagged");
                        self.send_status().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = status_tick.tick() => self.send_status().await,
                _ = enhanced_tick.tick() => self.send_status_update().await,
            }
        }

        info!("Control loop stopped");
    }

    async fn on_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("Control channel connected");
                self.publish(ControlEvent::Connected);
                self.send_initial_status().await;
            }
            TransportEvent::Disconnected => {
                info!("Control channel disconnected");
                self.publish(ControlEvent::Disconnected);
            }
            TransportEvent::Text(text) => self.handle_text(&text).await,
        }
    }

    /// Parse and act on one inbound frame. Failures are logged and dropped.
    pub async fn handle_text(&self, text: &str) {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Dropping control message");
                return;
            }
        };

        if let Err(e) = self.dispatch(message).await {
            match e {
                ControlError::InvalidCommand(_) | ControlError::Malformed(_) => {
                    debug!(error = %e, "Dropping control message")
                }
                other => warn!(error = %other, "Control message failed"),
            }
        }
    }

    async fn dispatch(&self, message: InboundMessage) -> Result<()> {
        match message {
            InboundMessage::Play(fields) => self.play(fields).await,
            InboundMessage::Control { action, fields } => match action {
                ControlAction::Play => self.play(fields).await,
                ControlAction::Pause => self.controller.pause().await,
                ControlAction::Resume => self.controller.resume().await,
                ControlAction::Stop => self.controller.stop().await,
            },
            InboundMessage::SetDefault { bhajan_id } => self.set_default(bhajan_id).await?,
            InboundMessage::GetStatus => self.send_status().await,
            InboundMessage::Volume { volume } => self.set_volume(volume).await?,
            InboundMessage::AuthSuccess { device_id } => self.adopt_device_id(device_id),
            InboundMessage::Ping => {
                let pong = OutboundMessage::Pong {
                    timestamp: self.uptime_millis(),
                };
                self.send(pong).await;
            }
            InboundMessage::Other { kind, body } => match &self.generic {
                Some(handler) => handler.handle(&kind, &body).await?,
                None => debug!(kind = %kind, "No handler for control message"),
            },
        }
        Ok(())
    }

    async fn play(&self, fields: PlayFields) {
        match fields.url() {
            Some(url) => {
                let name = fields
                    .name
                    .clone()
                    .unwrap_or_else(|| self.config.default_play_name.clone());
                self.controller
                    .start(url, name, TrackId(fields.track_id()))
                    .await;
            }
            None if self.controller.snapshot().state == PlaybackState::Paused => {
                self.controller.resume().await;
            }
            None => debug!("Play without url ignored: nothing paused"),
        }
    }

    async fn set_default(&self, bhajan_id: i64) -> Result<()> {
        if bhajan_id <= 0 {
            return Err(ControlError::InvalidCommand(format!(
                "default track id must be positive, got {}",
                bhajan_id
            )));
        }

        let persisted = self.settings.set_i64(DEFAULT_TRACK_KEY, bhajan_id).await;
        if let Err(e) = &persisted {
            warn!(error = %e, bhajan_id, "Could not persist default track");
        }
        let success = persisted.is_ok();

        self.controller.set_default_track(TrackId(bhajan_id));
        if success {
            info!(bhajan_id, "Default track set");
            self.publish(ControlEvent::DefaultTrackChanged {
                track_id: bhajan_id,
            });
        }

        self.send(OutboundMessage::BhajanDefaultSet { bhajan_id, success })
            .await;
        Ok(())
    }

    async fn set_volume(&self, volume: i64) -> Result<()> {
        if !self.controller.set_volume(volume) {
            return Err(ControlError::InvalidCommand(format!(
                "volume out of range: {}",
                volume
            )));
        }
        self.settings.set_i64(VOLUME_KEY, volume).await?;
        Ok(())
    }

    fn adopt_device_id(&self, device_id: Option<String>) {
        let Some(device_id) = device_id.filter(|id| !id.is_empty()) else {
            debug!("auth_success without deviceId");
            return;
        };
        info!(device_id = %device_id, "Device identified");
        *self.device_id.write() = device_id.clone();
        self.publish(ControlEvent::DeviceIdentified { device_id });
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    pub async fn send_status(&self) {
        let message = OutboundMessage::status(&self.device_id(), &self.controller.snapshot());
        self.send(message).await;
    }

    async fn send_initial_status(&self) {
        let message = OutboundMessage::initial(
            &self.device_id(),
            self.device.firmware_version(),
            self.device.signal_strength(),
            &self.controller.snapshot(),
        );
        self.send(message).await;
    }

    async fn send_status_update(&self) {
        let message = OutboundMessage::update(
            &self.device_id(),
            self.clock.unix_timestamp_millis(),
            (self.uptime_millis() / 1000) as u64,
            self.device.signal_strength(),
            &self.controller.snapshot(),
        );
        self.send(message).await;
    }

    async fn send(&self, message: OutboundMessage) {
        if !self.transport.is_connected() {
            debug!(kind = message.kind(), "Not connected, dropping message");
            return;
        }

        let text = match message.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, kind = message.kind(), "Could not encode message");
                return;
            }
        };

        if let Err(e) = self.transport.send_text(text).await {
            debug!(error = %e, kind = message.kind(), "Send failed");
        }
    }

    fn publish(&self, event: ControlEvent) {
        self.controller.events().emit(CoreEvent::Control(event)).ok();
    }
}
