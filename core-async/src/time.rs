//! Time-related abstractions.
//!
//! Timers come from `tokio::time`, so tests can run them on a paused,
//! auto-advancing clock (`#[tokio::test(start_paused = true)]`).

pub use tokio::time::{interval, sleep, sleep_until, timeout, Interval, MissedTickBehavior, Sleep};
pub use tokio::time::error::Elapsed;

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
