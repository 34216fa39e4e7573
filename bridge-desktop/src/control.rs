//! Line-delimited JSON control transport over TCP
//!
//! Desktop stand-in for the device's always-on WebSocket. Each message is a
//! single JSON object terminated by a newline. The connection is
//! re-established in the background after a fixed delay whenever it drops.

use async_trait::async_trait;
use bridge_traits::{
    control::{ControlTransport, TransportEvent},
    error::{BridgeError, Result},
};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MAX_LINE_LENGTH: usize = 64 * 1024;
const CHANNEL_CAPACITY: usize = 32;

pub struct TcpControlTransport {
    connected: Arc<AtomicBool>,
    outbound: mpsc::Sender<String>,
    inbound: Mutex<mpsc::Receiver<TransportEvent>>,
    shutdown: CancellationToken,
}

impl TcpControlTransport {
    /// Start connecting to `addr` (e.g. `127.0.0.1:8765`) in the background.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(addr: impl Into<String>, reconnect_delay: Duration) -> Self {
        let connected = Arc::new(AtomicBool::new(false));
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        let worker = ConnectionWorker {
            addr: addr.into(),
            reconnect_delay,
            connected: connected.clone(),
            outbound: outbound_rx,
            inbound: inbound_tx,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(worker.run());

        Self {
            connected,
            outbound: outbound_tx,
            inbound: Mutex::new(inbound_rx),
            shutdown,
        }
    }
}

impl Drop for TcpControlTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl ControlTransport for TcpControlTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_text(&self, text: String) -> Result<()> {
        if !self.is_connected() {
            return Err(BridgeError::NotAvailable(
                "control connection is down".to_string(),
            ));
        }

        self.outbound
            .send(text)
            .await
            .map_err(|_| BridgeError::ConnectionFailed("control worker stopped".to_string()))
    }

    async fn next_event(&self) -> Result<Option<TransportEvent>> {
        Ok(self.inbound.lock().await.recv().await)
    }
}

struct ConnectionWorker {
    addr: String,
    reconnect_delay: Duration,
    connected: Arc<AtomicBool>,
    outbound: mpsc::Receiver<String>,
    inbound: mpsc::Sender<TransportEvent>,
    shutdown: CancellationToken,
}

impl ConnectionWorker {
    async fn run(mut self) {
        loop {
            let attempt = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = TcpStream::connect(self.addr.as_str()) => result,
            };

            match attempt {
                Ok(stream) => {
                    info!(addr = %self.addr, "Control connection established");
                    self.discard_stale_outbound();
                    self.connected.store(true, Ordering::SeqCst);
                    if self.inbound.send(TransportEvent::Connected).await.is_err() {
                        break;
                    }

                    self.serve(stream).await;

                    self.connected.store(false, Ordering::SeqCst);
                    if self.inbound.send(TransportEvent::Disconnected).await.is_err() {
                        break;
                    }
                    info!(addr = %self.addr, "Control connection closed");
                }
                Err(e) => {
                    debug!(addr = %self.addr, error = %e, "Control connection attempt failed");
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.connected.store(false, Ordering::SeqCst);
    }

    fn discard_stale_outbound(&mut self) {
        while self.outbound.try_recv().is_ok() {}
    }

    async fn serve(&mut self, stream: TcpStream) {
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                line = framed.next() => match line {
                    Some(Ok(text)) => {
                        if text.trim().is_empty() {
                            continue;
                        }
                        if self.inbound.send(TransportEvent::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Control connection read failed");
                        return;
                    }
                    None => return,
                },
                outgoing = self.outbound.recv() => match outgoing {
                    Some(text) => {
                        if let Err(e) = framed.send(text).await {
                            warn!(error = %e, "Control connection write failed");
                            return;
                        }
                    }
                    None => return,
                },
            }
        }
    }
}
