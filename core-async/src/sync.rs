//! Synchronization primitives.
//!
//! Async-aware primitives and channels from tokio, plus the cooperative
//! [`CancellationToken`] used to shut long-lived loops down.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{CancellationToken, Notify};
//!
//! async fn example() {
//!     let notify = Notify::new();
//!     notify.notify_one();
//!     notify.notified().await;
//!
//!     let token = CancellationToken::new();
//!     token.cancel();
//!     assert!(token.is_cancelled());
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

pub use tokio_util::sync::CancellationToken;
