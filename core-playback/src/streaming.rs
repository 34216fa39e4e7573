//! # Streaming Engine
//!
//! Long-lived loop that turns pending playback requests into PCM blocks on
//! the [`AudioOutput`].
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────┐  take_pending / Notify
//! │  PlaybackController    │◄──────────────────────┐
//! └──────────┬─────────────┘                       │
//!            │ session_status(gen)                 │
//!            ▼                                     │
//! ┌────────────────────────┐   GET (Range)   ┌─────┴──────┐
//! │   StreamingEngine      │────────────────►│ HttpClient │
//! │  read block            │                 └────────────┘
//! │  scale volume          │
//! │  write_block           │────────────────► AudioOutput
//! │  update_position       │
//! └──────────┬─────────────┘
//!            │ fetch-and-play fallback
//!            ▼
//!       CacheStore
//! ```
//!
//! ## Fetch loop
//!
//! Each request gets a bounded budget of consecutive failed attempts
//! (`max_attempts`) with a fixed delay between them. A read error, a read
//! timeout or an early end of body after a successful response is a premature
//! close: the engine re-requests from the last delivered byte with
//! `Range: bytes=<delivered>-`. Writing a block resets the failure count.
//!
//! Pause keeps the connection open and stops writing. Stop and a newer
//! request end the session within one block read or one pause poll.

use crate::cache::{CacheStore, StoreLimits, TrackMeta};
use crate::config::StreamingConfig;
use crate::controller::{PlaybackController, SessionStatus};
use crate::descriptor::{PendingRequest, StreamRequest};
use crate::error::{PlaybackError, Result};
use crate::volume::scale_block;
use bridge_traits::{AudioOutput, HttpClient, HttpRequest, RetryPolicy};
use core_async::io::{AsyncRead, AsyncReadExt};
use core_async::sync::CancellationToken;
use core_async::time::{sleep, timeout, Duration};
use core_runtime::config::DEFAULT_USER_AGENT;
use core_runtime::events::PlaybackEvent;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

type Body = Box<dyn AsyncRead + Send + Unpin>;

/// How a session ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Body exhausted while Playing.
    Completed,
    /// Stopped, superseded, or the loop is shutting down.
    Cancelled,
}

#[derive(Debug)]
struct Failure {
    error: PlaybackError,
    attempts: u32,
}

struct OpenedStream {
    body: Body,
    /// Leading bytes to discard when a ranged request was answered with 200.
    skip: u64,
    /// Full track length, when the response reports one.
    total_len: Option<u64>,
}

#[derive(Debug, Default)]
struct Progress {
    delivered: u64,
    expected: Option<u64>,
    failures: u32,
}

/// Streaming loop bound to one controller and one audio sink.
pub struct StreamingEngine {
    controller: Arc<PlaybackController>,
    http: Arc<dyn HttpClient>,
    output: Arc<dyn AudioOutput>,
    cache: Option<CacheStore>,
    config: StreamingConfig,
    retry: RetryPolicy,
    user_agent: String,
}

impl StreamingEngine {
    pub fn new(
        controller: Arc<PlaybackController>,
        http: Arc<dyn HttpClient>,
        output: Arc<dyn AudioOutput>,
        config: StreamingConfig,
    ) -> Self {
        Self {
            controller,
            http,
            output,
            cache: None,
            retry: config.retry_policy(),
            config,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Enable the fetch-and-play fallback.
    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Serve requests until `cancel` fires.
    #[instrument(skip(self, cancel))]
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            block_size = self.config.block_size,
            fallback = self.cache.is_some(),
            "Streaming loop started"
        );

        while !cancel.is_cancelled() {
            match self.controller.take_pending() {
                Some(pending) => self.play(pending, &cancel).await,
                None => {
                    self.controller
                        .wait_for_request(self.config.poll_interval)
                        .await
                }
            }
        }

        info!("Streaming loop stopped");
    }

    async fn play(&self, pending: PendingRequest, cancel: &CancellationToken) {
        let request = pending.request().clone();
        if !self.controller.begin_stream(&request) {
            debug!(track_id = %request.track_id, "Request superseded before start");
            return;
        }

        if let Err(e) = self.output.start().await {
            let error = PlaybackError::Output(e.to_string());
            self.controller
                .finish_failed(request.generation, &error, 0);
            return;
        }

        let result = if pending.allows_fallback() {
            self.fetch_and_play(&request, cancel).await
        } else {
            self.stream(&request, None, cancel).await
        };

        if let Err(e) = self.output.stop().await {
            debug!(error = %e, "Audio output stop failed");
        }

        match result {
            Ok(Outcome::Completed) => {
                self.controller.finish_completed(request.generation);
            }
            Ok(Outcome::Cancelled) => {
                debug!(track_id = %request.track_id, "Session ended");
            }
            Err(failure) => {
                self.controller
                    .finish_failed(request.generation, &failure.error, failure.attempts);
            }
        }
    }

    /// Direct streaming with retries and ranged reconnects.
    async fn stream(
        &self,
        request: &StreamRequest,
        mut initial: Option<OpenedStream>,
        cancel: &CancellationToken,
    ) -> std::result::Result<Outcome, Failure> {
        let mut progress = Progress::default();

        loop {
            let attempt = match initial.take() {
                Some(opened) => Ok(opened),
                None => self.open(request, progress.delivered).await,
            };

            let error = match attempt {
                Ok(opened) => {
                    self.observe_length(request, &mut progress, opened.total_len);
                    match self
                        .pump(request, opened.body, opened.skip, &mut progress, cancel)
                        .await
                    {
                        Ok(outcome) => return Ok(outcome),
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            progress.failures += 1;
            if !error.is_retryable() || progress.failures >= self.retry.max_attempts {
                return Err(Failure {
                    error,
                    attempts: progress.failures,
                });
            }

            warn!(
                track_id = %request.track_id,
                attempt = progress.failures,
                delivered = progress.delivered,
                error = %error,
                "Stream attempt failed, retrying"
            );
            self.controller.emit(PlaybackEvent::Retrying {
                track_id: request.track_id.0,
                attempt: progress.failures,
                reason: error.to_string(),
            });

            let delay = self.retry.delay_for_attempt(progress.failures);
            if !self.wait_before_retry(delay, request.generation, cancel).await {
                return Ok(Outcome::Cancelled);
            }
        }
    }

    /// One direct attempt, then download into the cache and play the copy.
    async fn fetch_and_play(
        &self,
        request: &StreamRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<Outcome, Failure> {
        let direct_error = match self.open(request, 0).await {
            Ok(opened) => return self.stream(request, Some(opened), cancel).await,
            Err(e) => e,
        };

        warn!(
            track_id = %request.track_id,
            error = %direct_error,
            "Direct stream failed, downloading to cache"
        );
        self.controller.emit(PlaybackEvent::FallbackEngaged {
            track_id: request.track_id.0,
        });

        let failed = |error: PlaybackError| Failure { error, attempts: 2 };

        let Some(cache) = &self.cache else {
            return Err(Failure {
                error: PlaybackError::CacheUnavailable("no cache configured".to_string()),
                attempts: 1,
            });
        };

        let generation = request.generation;
        self.controller.hold_clock(generation);
        let download = self.open(request, 0).await.map_err(failed)?;
        let meta = TrackMeta {
            track_id: request.track_id,
            name: request.name.clone(),
            source_url: request.url.clone(),
        };

        let controller = &self.controller;
        let limits = StoreLimits {
            expected_len: download.total_len,
            read_timeout: self.config.read_timeout,
        };
        let stored = cache
            .store(meta, download.body, limits, || {
                !cancel.is_cancelled()
                    && controller.session_status(generation) != SessionStatus::Ended
            })
            .await
            .map_err(failed)?;
        if stored.is_none() {
            return Ok(Outcome::Cancelled);
        }

        let (track, reader) = cache.open().await.map_err(failed)?;
        info!(track_id = %request.track_id, byte_len = track.byte_len, "Playing cached copy");

        self.controller
            .set_duration(generation, self.output.format().duration_secs(track.byte_len));
        self.controller.start_clock(generation);

        let mut progress = Progress {
            expected: Some(track.byte_len),
            ..Progress::default()
        };
        self.pump(request, reader, 0, &mut progress, cancel)
            .await
            .map_err(failed)
    }

    async fn open(&self, request: &StreamRequest, offset: u64) -> Result<OpenedStream> {
        let mut http_request = HttpRequest::get(request.url.as_str())
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.config.connect_timeout);
        if let Some(token) = &self.config.auth_token {
            http_request = http_request.bearer_token(token.as_str());
        }
        if offset > 0 {
            http_request = http_request.range_from(offset);
        }

        debug!(url = %request.url, offset, "Opening stream");
        let stream = match timeout(
            self.config.connect_timeout,
            self.http.open_stream(http_request),
        )
        .await
        {
            Ok(result) => result.map_err(PlaybackError::from_fetch)?,
            Err(_) => {
                return Err(PlaybackError::ConnectFailed(format!(
                    "no response within {:?}",
                    self.config.connect_timeout
                )))
            }
        };

        let (skip, total_len) = match (offset, stream.status) {
            (0, 200) => (0, stream.content_length),
            (o, 206) if o > 0 => (0, stream.content_length.map(|len| len + o)),
            (o, 200) if o > 0 => (o, stream.content_length),
            (_, status) => return Err(PlaybackError::HttpStatus(status)),
        };

        Ok(OpenedStream {
            body: stream.body,
            skip,
            total_len,
        })
    }

    fn observe_length(&self, request: &StreamRequest, progress: &mut Progress, total: Option<u64>) {
        if progress.expected.is_some() {
            return;
        }
        if let Some(total) = total {
            progress.expected = Some(total);
            let duration = self.output.format().duration_secs(total);
            self.controller.set_duration(request.generation, duration);
            debug!(track_id = %request.track_id, total, duration, "Track length known");
        }
    }

    /// Move blocks from `body` to the sink until the body ends or the
    /// session does.
    async fn pump(
        &self,
        request: &StreamRequest,
        mut body: Body,
        mut skip: u64,
        progress: &mut Progress,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let generation = request.generation;
        let mut block = vec![0u8; self.config.block_size];

        loop {
            let n = self.read_block(&mut body, &mut block).await?;
            if n == 0 {
                if let Some(expected) = progress.expected {
                    if progress.delivered < expected {
                        return Err(PlaybackError::DecodeShortfall {
                            delivered: progress.delivered,
                            expected,
                        });
                    }
                }
                return Ok(Outcome::Completed);
            }

            let mut start = 0;
            if skip > 0 {
                start = skip.min(n as u64) as usize;
                skip -= start as u64;
                if start == n {
                    continue;
                }
            }

            let Some(volume) = self.wait_while_paused(generation, cancel).await else {
                return Ok(Outcome::Cancelled);
            };

            let data = &mut block[start..n];
            scale_block(data, volume);
            self.output
                .write_block(data)
                .await
                .map_err(|e| PlaybackError::Output(e.to_string()))?;

            progress.delivered += data.len() as u64;
            progress.failures = 0;
            self.controller.update_position(generation);
        }
    }

    /// Fill `block` from `body`. Returns fewer bytes only at end of body.
    async fn read_block(&self, body: &mut Body, block: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < block.len() {
            let n = match timeout(self.config.read_timeout, body.read(&mut block[filled..])).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    return Err(PlaybackError::ConnectFailed(format!("read failed: {}", e)))
                }
                Err(_) => {
                    return Err(PlaybackError::ReadTimeout(
                        self.config.read_timeout.as_millis() as u64,
                    ))
                }
            };
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Block while Paused. Returns the volume to apply, or `None` when the
    /// session ended.
    async fn wait_while_paused(&self, generation: u64, cancel: &CancellationToken) -> Option<u8> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            match self.controller.session_status(generation) {
                SessionStatus::Playing { volume } => return Some(volume),
                SessionStatus::Ended => return None,
                SessionStatus::Paused => sleep(self.config.pause_poll_interval).await,
            }
        }
    }

    /// Sleep the retry delay in short slices. Returns `false` when the
    /// session ended meanwhile.
    async fn wait_before_retry(
        &self,
        delay: Duration,
        generation: u64,
        cancel: &CancellationToken,
    ) -> bool {
        let mut waited = Duration::ZERO;
        while waited < delay {
            let step = (delay - waited).min(self.config.pause_poll_interval);
            sleep(step).await;
            waited += step;

            if cancel.is_cancelled()
                || self.controller.session_status(generation) == SessionStatus::Ended
            {
                return false;
            }
        }
        true
    }
}
