//! Boot-time failures.

use thiserror::Error;

/// Raised while assembling the runtime; never once the core is running.
#[derive(Error, Debug)]
pub enum Error {
    /// A configured value is unusable.
    #[error("Invalid device configuration: {0}")]
    Config(String),

    /// A required host bridge was not supplied and has no default.
    #[error("No {capability} bridge: {message}")]
    CapabilityMissing { capability: String, message: String },

    /// A default bridge could not be constructed.
    #[error("Runtime setup failed: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
