//! Workspace facade crate.
//!
//! Re-exports the playback core and the control channel adapter so a host
//! firmware or simulator can depend on one crate. The `desktop-shims` feature
//! additionally exposes the `core-service` bootstrap with desktop bridge
//! defaults.

pub use core_control as control;
pub use core_playback as playback;

#[cfg(feature = "desktop-shims")]
pub use core_service as service;
