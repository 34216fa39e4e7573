//! Wall-clock source.
//!
//! Playback position and the control channel's uptime are both computed as
//! differences of [`Clock::unix_timestamp_millis`] readings, so tests inject
//! a manual clock and advance it by hand.

use chrono::{DateTime, Utc};

/// Injectable time source.
///
/// ```ignore
/// fn played_ms(clock: &dyn Clock, started_at: i64) -> i64 {
///     clock.unix_timestamp_millis() - started_at
/// }
/// ```
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Whole seconds since the epoch.
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }

    /// Milliseconds since the epoch.
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// The host's real-time clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
