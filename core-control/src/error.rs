//! Control channel error types.

use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    /// The frame is not a JSON object with a string `type`.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// The message kind is known but its fields are not acceptable.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, ControlError>;
