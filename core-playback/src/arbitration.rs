//! # Audio Arbitration
//!
//! Mutes the competing host audio path while this core is producing sound.
//!
//! The loop polls [`PlaybackController::is_active`] and acts only on edges:
//! `suspend()` when playback becomes active, `resume()` when it stops being
//! active. It shares no lock with the streaming loop, so the competing path
//! may lag a state change by up to one interval.

use crate::controller::PlaybackController;
use bridge_traits::CompetingAudio;
use core_async::sync::CancellationToken;
use core_async::time::{sleep, Duration};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct ArbitrationLoop {
    controller: Arc<PlaybackController>,
    competing: Arc<dyn CompetingAudio>,
    interval: Duration,
    suspended: bool,
}

impl ArbitrationLoop {
    pub fn new(
        controller: Arc<PlaybackController>,
        competing: Arc<dyn CompetingAudio>,
        interval: Duration,
    ) -> Self {
        Self {
            controller,
            competing,
            interval,
            suspended: false,
        }
    }

    /// Whether the competing path is currently suspended by this loop.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Check once and act on an edge.
    pub async fn tick(&mut self) {
        let active = self.controller.is_active();
        if active == self.suspended {
            return;
        }

        let result = if active {
            debug!(path = self.competing.name(), "Suspending competing audio");
            self.competing.suspend().await
        } else {
            debug!(path = self.competing.name(), "Resuming competing audio");
            self.competing.resume().await
        };

        match result {
            Ok(()) => self.suspended = active,
            // Retried on the next tick.
            Err(e) => warn!(error = %e, active, "Competing audio transition failed"),
        }
    }

    #[instrument(skip(self, cancel))]
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "Arbitration loop started");
        while !cancel.is_cancelled() {
            self.tick().await;
            sleep(self.interval).await;
        }

        if self.suspended {
            if let Err(e) = self.competing.resume().await {
                warn!(error = %e, "Could not restore competing audio on shutdown");
            }
        }
        info!("Arbitration loop stopped");
    }
}
