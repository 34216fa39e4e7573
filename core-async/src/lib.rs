//! Async runtime facade for the device audio core.
//!
//! Every core-* and bridge-* crate depends on this crate instead of naming
//! tokio directly, so the runtime choice stays in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning and execution
//! - `time`: Sleep, timeout, interval
//! - `sync`: Synchronization primitives, channels and cancellation
//! - `io`: Async read/write traits
//! - `runtime`: Runtime handles
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod io;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};

/// Wait on several futures, running the branch of the first to complete.
pub use tokio::select;
