//! # Playback Controller
//!
//! State machine and command surface of the playback core.
//!
//! ## Overview
//!
//! The controller owns the [`PlaybackDescriptor`] behind a single
//! non-reentrant lock. Commands (`start`, `pause`, `resume`, `stop`, volume,
//! button toggle) are fire-and-forget: they never return a failure, and a
//! command that does not apply to the current state is a no-op.
//!
//! Every method holds the lock only for its in-memory read-modify-write.
//! Events, feedback cues and network calls happen after the guard is dropped.
//!
//! ## Generations
//!
//! Each new request and each stop bumps a generation counter. The streaming
//! loop tags its session with the generation it started under and treats a
//! mismatch as "superseded", which is how a `start` issued while Playing
//! ends the previous stream before the new one begins.
//!
//! ## Usage
//!
//! ```ignore
//! let controller = Arc::new(
//!     PlaybackController::new(events.clone(), clock.clone())
//!         .with_feedback(feedback)
//!         .with_initial_volume(80),
//! );
//!
//! controller.start("https://x/track.pcm", "Evening Aarti", TrackId(7)).await;
//! assert_eq!(controller.snapshot().state, PlaybackState::Stopped); // pending
//! ```

use crate::descriptor::{
    PendingRequest, PlaybackDescriptor, PlaybackSnapshot, PlaybackState, StreamRequest, TrackId,
};
use crate::error::PlaybackError;
use crate::resolver::DefaultTrackResolver;
use bridge_traits::{Clock, FeedbackCue, FeedbackIndicator};
use core_async::sync::Notify;
use core_async::time::{timeout, Duration};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the streaming loop should do with its current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionStatus {
    Playing { volume: u8 },
    Paused,
    /// Stopped, or superseded by a newer request.
    Ended,
}

struct ControllerState {
    descriptor: PlaybackDescriptor,
    pending: Option<PendingRequest>,
    generation: u64,
    /// Wall-clock millis at which playback would have started had it never
    /// been paused.
    started_at_ms: i64,
    /// Set while the session is Playing but no audio has reached the sink
    /// yet (fallback download). The position stays at zero meanwhile.
    clock_held: bool,
    default_track: TrackId,
}

impl ControllerState {
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    fn elapsed_position(&self, now_ms: i64) -> u32 {
        if self.clock_held {
            return self.descriptor.position;
        }
        let elapsed = ((now_ms - self.started_at_ms).max(0) / 1000).min(u32::MAX as i64) as u32;
        let clamped = if self.descriptor.duration > 0 {
            elapsed.min(self.descriptor.duration)
        } else {
            elapsed
        };
        clamped.max(self.descriptor.position)
    }
}

enum ButtonAction {
    Replay {
        url: String,
        name: String,
        track_id: TrackId,
    },
    PlayDefault(TrackId),
    Pause,
    Resume,
}

/// Owner of the playback descriptor and entry point for every command.
pub struct PlaybackController {
    state: Mutex<ControllerState>,
    wake: Notify,
    events: EventBus,
    clock: Arc<dyn Clock>,
    feedback: Option<Arc<dyn FeedbackIndicator>>,
    resolver: Option<Arc<dyn DefaultTrackResolver>>,
}

impl PlaybackController {
    pub fn new(events: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(ControllerState {
                descriptor: PlaybackDescriptor::default(),
                pending: None,
                generation: 0,
                started_at_ms: 0,
                clock_held: false,
                default_track: TrackId::NONE,
            }),
            wake: Notify::new(),
            events,
            clock,
            feedback: None,
            resolver: None,
        }
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackIndicator>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DefaultTrackResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Volume restored from persisted settings. Out-of-range values are clamped.
    pub fn with_initial_volume(self, volume: u8) -> Self {
        self.state.lock().descriptor.volume = volume.min(100);
        self
    }

    pub fn with_default_track(self, track_id: TrackId) -> Self {
        self.state.lock().default_track = track_id;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Request playback of `url`, replacing whatever is playing.
    ///
    /// Returns once the request is recorded; the stream starts when the
    /// streaming loop picks it up.
    pub async fn start(&self, url: impl Into<String>, name: impl Into<String>, track_id: TrackId) {
        self.request(url.into(), name.into(), track_id, false).await;
    }

    /// Like [`start`](Self::start), but falls back to downloading the track
    /// into the cache when the direct stream cannot be established.
    pub async fn fetch_and_play(
        &self,
        url: impl Into<String>,
        name: impl Into<String>,
        track_id: TrackId,
    ) {
        self.request(url.into(), name.into(), track_id, true).await;
    }

    async fn request(&self, url: String, name: String, track_id: TrackId, fallback: bool) {
        if url.trim().is_empty() {
            debug!(track_id = %track_id, "Ignoring playback request without url");
            return;
        }

        let interrupted = {
            let mut state = self.state.lock();
            let previous = state.descriptor.track_id;
            let was_active = state.descriptor.state != PlaybackState::Stopped;

            state.generation += 1;
            let request = StreamRequest {
                url: url.clone(),
                track_id,
                name: name.clone(),
                generation: state.generation,
            };

            let descriptor = &mut state.descriptor;
            descriptor.state = PlaybackState::Stopped;
            descriptor.position = 0;
            descriptor.duration = 0;
            descriptor.track_id = track_id;
            descriptor.name = name.clone();
            descriptor.source_url = url;

            state.pending = Some(if fallback {
                PendingRequest::FetchAndPlay(request)
            } else {
                PendingRequest::Stream(request)
            });

            was_active.then_some(previous)
        };

        self.wake.notify_one();

        if let Some(previous) = interrupted {
            info!(track_id = %previous, "Stopping current track for new request");
            self.emit(PlaybackEvent::Stopped {
                track_id: previous.0,
            });
        }

        info!(track_id = %track_id, name = %name, fallback, "Playback requested");
        self.emit(PlaybackEvent::Requested {
            track_id: track_id.0,
            name,
            fallback,
        });
        self.cue(FeedbackCue::Start).await;
    }

    /// Playing -> Paused, freezing the position. No-op in any other state.
    pub async fn pause(&self) {
        let now = self.clock.unix_timestamp_millis();
        let paused = {
            let mut state = self.state.lock();
            if state.descriptor.state == PlaybackState::Playing {
                let position = state.elapsed_position(now);
                state.descriptor.position = position;
                state.descriptor.state = PlaybackState::Paused;
                Some((state.descriptor.track_id, position))
            } else {
                None
            }
        };

        match paused {
            Some((track_id, position)) => {
                info!(track_id = %track_id, position, "Playback paused");
                self.emit(PlaybackEvent::Paused {
                    track_id: track_id.0,
                    position_secs: position,
                });
                self.cue(FeedbackCue::Pause).await;
            }
            None => debug!("Pause ignored: not playing"),
        }
    }

    /// Paused -> Playing, continuing the clock from the frozen position.
    /// No-op in any other state.
    pub async fn resume(&self) {
        let now = self.clock.unix_timestamp_millis();
        let resumed = {
            let mut state = self.state.lock();
            if state.descriptor.state == PlaybackState::Paused {
                state.started_at_ms = now - i64::from(state.descriptor.position) * 1000;
                state.descriptor.state = PlaybackState::Playing;
                Some((state.descriptor.track_id, state.descriptor.position))
            } else {
                None
            }
        };

        match resumed {
            Some((track_id, position)) => {
                info!(track_id = %track_id, position, "Playback resumed");
                self.emit(PlaybackEvent::Resumed {
                    track_id: track_id.0,
                    position_secs: position,
                });
                self.cue(FeedbackCue::Resume).await;
            }
            None => debug!("Resume ignored: not paused"),
        }
    }

    /// Stop unconditionally and drop any pending request.
    pub async fn stop(&self) {
        let track_id = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.pending = None;
            state.descriptor.state = PlaybackState::Stopped;
            state.descriptor.position = 0;
            state.descriptor.track_id
        };

        info!(track_id = %track_id, "Playback stopped");
        self.emit(PlaybackEvent::Stopped {
            track_id: track_id.0,
        });
        self.cue(FeedbackCue::Stop).await;
    }

    /// Set the output volume. Values outside 0-100 are ignored.
    ///
    /// Returns whether the value was accepted.
    pub fn set_volume(&self, volume: i64) -> bool {
        let Ok(volume) = u8::try_from(volume) else {
            debug!(volume, "Ignoring out-of-range volume");
            return false;
        };
        if volume > 100 {
            debug!(volume, "Ignoring out-of-range volume");
            return false;
        }

        self.state.lock().descriptor.volume = volume;

        debug!(volume, "Volume set");
        self.emit(PlaybackEvent::VolumeChanged { volume });
        true
    }

    /// Whether audio is currently being produced.
    pub fn is_active(&self) -> bool {
        self.state.lock().descriptor.state == PlaybackState::Playing
    }

    /// Local button toggle: Stopped plays the last known (or default) track,
    /// Playing pauses, Paused resumes.
    pub async fn on_button_press(&self) {
        let action = {
            let state = self.state.lock();
            let descriptor = &state.descriptor;
            match descriptor.state {
                PlaybackState::Playing => ButtonAction::Pause,
                PlaybackState::Paused => ButtonAction::Resume,
                PlaybackState::Stopped if descriptor.has_source() => ButtonAction::Replay {
                    url: descriptor.source_url.clone(),
                    name: descriptor.name.clone(),
                    track_id: descriptor.track_id,
                },
                PlaybackState::Stopped => ButtonAction::PlayDefault(state.default_track),
            }
        };

        match action {
            ButtonAction::Pause => self.pause().await,
            ButtonAction::Resume => self.resume().await,
            ButtonAction::Replay {
                url,
                name,
                track_id,
            } => self.start(url, name, track_id).await,
            ButtonAction::PlayDefault(default_track) => self.play_default(default_track).await,
        }
    }

    async fn play_default(&self, default_track: TrackId) {
        let Some(resolver) = &self.resolver else {
            debug!("No track known and no default resolver configured");
            return;
        };

        match resolver.resolve(default_track).await {
            Ok(track) => {
                self.fetch_and_play(track.url, track.name, track.track_id)
                    .await
            }
            Err(e) => warn!(error = %e, "Could not resolve default track"),
        }
    }

    /// Resolve and play the device's default track.
    pub async fn play_default_track(&self) {
        let default_track = self.default_track();
        self.play_default(default_track).await;
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.lock().descriptor.snapshot()
    }

    pub fn default_track(&self) -> TrackId {
        self.state.lock().default_track
    }

    /// Record the default track id. Persistence is the caller's concern.
    pub fn set_default_track(&self, track_id: TrackId) {
        self.state.lock().default_track = track_id;
        debug!(track_id = %track_id, "Default track updated");
    }

    // ========================================================================
    // Streaming loop hooks
    // ========================================================================

    /// Take the pending request, if any.
    pub(crate) fn take_pending(&self) -> Option<PendingRequest> {
        self.state.lock().pending.take()
    }

    /// Wait until a request may be pending, at most `poll`.
    pub(crate) async fn wait_for_request(&self, poll: Duration) {
        let _ = timeout(poll, self.wake.notified()).await;
    }

    /// Mark the request as Playing. Returns `false` when it was superseded.
    pub(crate) fn begin_stream(&self, request: &StreamRequest) -> bool {
        let now = self.clock.unix_timestamp_millis();
        {
            let mut state = self.state.lock();
            if !state.is_current(request.generation) {
                return false;
            }
            state.started_at_ms = now;
            state.clock_held = false;
            state.descriptor.state = PlaybackState::Playing;
            state.descriptor.position = 0;
        }

        info!(track_id = %request.track_id, "Playback started");
        self.emit(PlaybackEvent::Started {
            track_id: request.track_id.0,
            name: request.name.clone(),
        });
        true
    }

    /// Keep the position at zero until [`start_clock`](Self::start_clock),
    /// e.g. while a fallback download runs.
    pub(crate) fn hold_clock(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.is_current(generation) {
            state.clock_held = true;
            state.descriptor.position = 0;
        }
    }

    /// Audio is about to begin: run the clock from the current position.
    /// A Paused session keeps its frozen position; resume restarts the clock.
    pub(crate) fn start_clock(&self, generation: u64) {
        let now = self.clock.unix_timestamp_millis();
        let mut state = self.state.lock();
        if !state.is_current(generation) {
            return;
        }
        state.clock_held = false;
        if state.descriptor.state == PlaybackState::Playing {
            state.started_at_ms = now - i64::from(state.descriptor.position) * 1000;
        }
    }

    pub(crate) fn session_status(&self, generation: u64) -> SessionStatus {
        let state = self.state.lock();
        if !state.is_current(generation) {
            return SessionStatus::Ended;
        }
        match state.descriptor.state {
            PlaybackState::Playing => SessionStatus::Playing {
                volume: state.descriptor.volume,
            },
            PlaybackState::Paused => SessionStatus::Paused,
            PlaybackState::Stopped => SessionStatus::Ended,
        }
    }

    /// Recompute the elapsed position from the wall clock.
    pub(crate) fn update_position(&self, generation: u64) {
        let now = self.clock.unix_timestamp_millis();
        let mut state = self.state.lock();
        if state.is_current(generation) && state.descriptor.state == PlaybackState::Playing {
            state.descriptor.position = state.elapsed_position(now);
        }
    }

    pub(crate) fn set_duration(&self, generation: u64, duration_secs: u32) {
        let mut state = self.state.lock();
        if state.is_current(generation) {
            state.descriptor.duration = duration_secs;
        }
    }

    /// Body exhausted while Playing: Stopped with the position reset.
    pub(crate) fn finish_completed(&self, generation: u64) -> bool {
        let track_id = {
            let mut state = self.state.lock();
            if !state.is_current(generation) || state.descriptor.state != PlaybackState::Playing {
                return false;
            }
            state.descriptor.state = PlaybackState::Stopped;
            state.descriptor.position = 0;
            state.descriptor.track_id
        };

        info!(track_id = %track_id, "Track completed");
        self.emit(PlaybackEvent::Completed {
            track_id: track_id.0,
        });
        true
    }

    /// Terminal failure of the current request.
    pub(crate) fn finish_failed(&self, generation: u64, error: &PlaybackError, attempts: u32) -> bool {
        let track_id = {
            let mut state = self.state.lock();
            if !state.is_current(generation) || state.descriptor.state == PlaybackState::Stopped {
                return false;
            }
            state.descriptor.state = PlaybackState::Stopped;
            state.descriptor.position = 0;
            state.descriptor.track_id
        };

        tracing::error!(track_id = %track_id, attempts, error = %error, "Playback failed");
        self.emit(PlaybackEvent::Failed {
            track_id: track_id.0,
            message: error.to_string(),
            attempts,
        });
        true
    }

    pub(crate) fn emit(&self, event: PlaybackEvent) {
        self.events.emit(CoreEvent::Playback(event)).ok();
    }

    async fn cue(&self, cue: FeedbackCue) {
        if let Some(feedback) = &self.feedback {
            if let Err(e) = feedback.cue(cue).await {
                debug!(error = %e, cue = ?cue, "Feedback cue failed");
            }
        }
    }
}
