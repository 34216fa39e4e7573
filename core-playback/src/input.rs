//! Local button polling.

use crate::controller::PlaybackController;
use bridge_traits::ButtonInput;
use core_async::sync::CancellationToken;
use core_async::time::{sleep, Duration};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Polls a debounced [`ButtonInput`] and forwards presses to the controller.
pub struct InputLoop {
    controller: Arc<PlaybackController>,
    button: Arc<dyn ButtonInput>,
    interval: Duration,
}

impl InputLoop {
    pub fn new(
        controller: Arc<PlaybackController>,
        button: Arc<dyn ButtonInput>,
        interval: Duration,
    ) -> Self {
        Self {
            controller,
            button,
            interval,
        }
    }

    #[instrument(skip(self, cancel))]
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "Input loop started");
        while !cancel.is_cancelled() {
            match self.button.was_pressed().await {
                Ok(true) => {
                    debug!("Button pressed");
                    self.controller.on_button_press().await;
                }
                Ok(false) => {}
                Err(e) => debug!(error = %e, "Button read failed"),
            }
            sleep(self.interval).await;
        }
        info!("Input loop stopped");
    }
}
