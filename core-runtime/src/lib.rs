//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the device audio core:
//! - Logging and tracing infrastructure
//! - Bootstrap configuration and bridge injection
//! - Event bus for playback and control notifications
//!
//! ## Overview
//!
//! This crate contains the runtime pieces every other core crate depends on.
//! It fixes the logging conventions, carries the host bridges chosen at boot,
//! and broadcasts playback transitions to whoever needs to report them.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
