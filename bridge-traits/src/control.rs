//! Remote Control Channel Abstraction
//!
//! The device keeps one always-on, bidirectional text-message connection to
//! its control server. The transport owns connection management (including
//! reconnects); the core only sees connection edges and message payloads.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Event surfaced by a [`ControlTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection was (re-)established.
    Connected,
    /// The connection dropped; the transport keeps trying to reconnect.
    Disconnected,
    /// A text frame received from the server.
    Text(String),
}

/// Bidirectional text-message transport to the control server.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::control::{ControlTransport, TransportEvent};
///
/// async fn pump(transport: &dyn ControlTransport) -> Result<()> {
///     while let Some(event) = transport.next_event().await? {
///         if let TransportEvent::Text(text) = event {
///             println!("{text}");
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ControlTransport: Send + Sync {
    /// Whether a connection is currently established.
    fn is_connected(&self) -> bool;

    /// Send one text frame.
    ///
    /// Fails with [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable)
    /// when no connection is established. Nothing is queued.
    async fn send_text(&self, text: String) -> Result<()>;

    /// Wait for the next transport event. `Ok(None)` means the transport was
    /// shut down and will produce no further events.
    async fn next_event(&self) -> Result<Option<TransportEvent>>;
}

/// Receives inbound control messages whose kind the core does not handle
/// (firmware update, factory reset, restart, ...).
#[async_trait]
pub trait GenericMessageHandler: Send + Sync {
    async fn handle(&self, kind: &str, message: &Value) -> Result<()>;
}
