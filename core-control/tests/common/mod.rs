#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioOutput, BridgeError, Clock, ControlTransport, DeviceInfo, HttpClient, HttpRequest,
    HttpResponse, HttpStream, PcmFormat, SettingsStore, TransportEvent,
};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

// ============================================================================
// Clock
// ============================================================================

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
    }

    pub fn advance_millis(&self, millis: i64) {
        *self.0.lock() += chrono::Duration::milliseconds(millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

// ============================================================================
// Transport
// ============================================================================

/// In-process transport. Inbound events are scripted by the test; outbound
/// frames are recorded and parsed. The link counts as up once the
/// `Connected` event has been handed out.
pub struct FakeTransport {
    connected: AtomicBool,
    inbound_tx: mpsc::UnboundedSender<Option<TransportEvent>>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Option<TransportEvent>>>,
    sent: Mutex<Vec<Value>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            connected: AtomicBool::new(false),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn connect(&self) {
        self.inbound_tx.send(Some(TransportEvent::Connected)).ok();
    }

    pub fn disconnect(&self) {
        self.inbound_tx.send(Some(TransportEvent::Disconnected)).ok();
    }

    pub fn push_text(&self, text: &str) {
        self.inbound_tx
            .send(Some(TransportEvent::Text(text.to_string())))
            .ok();
    }

    /// End of events: `next_event` returns `Ok(None)` from here on.
    pub fn close(&self) {
        self.inbound_tx.send(None).ok();
    }

    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    pub fn sent_of(&self, kind: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|message| message["type"] == kind)
            .collect()
    }

    /// Wait until a frame satisfying `pred` has been sent.
    pub async fn wait_for_sent<F>(&self, pred: F) -> Value
    where
        F: Fn(&Value) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(600), async {
            loop {
                if let Some(found) = self.sent().into_iter().find(|m| pred(m)) {
                    return found;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("expected frame was never sent")
    }
}

#[async_trait]
impl ControlTransport for FakeTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_text(&self, text: String) -> BridgeResult<()> {
        if !self.is_connected() {
            return Err(BridgeError::NotAvailable("not connected".to_string()));
        }
        let value = serde_json::from_str(&text)
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        self.sent.lock().push(value);
        Ok(())
    }

    async fn next_event(&self) -> BridgeResult<Option<TransportEvent>> {
        let mut rx = self.inbound_rx.lock().await;
        let event = rx.recv().await.flatten();
        match event {
            Some(TransportEvent::Connected) => self.connected.store(true, Ordering::SeqCst),
            Some(TransportEvent::Disconnected) => self.connected.store(false, Ordering::SeqCst),
            _ => {}
        }
        Ok(event)
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemorySettings {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every write fails from now on.
    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn check_writable(&self) -> BridgeResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::DatabaseError("flash is read-only".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.check_writable()?;
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.value(key))
    }

    async fn set_i64(&self, key: &str, value: i64) -> BridgeResult<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_i64(&self, key: &str) -> BridgeResult<Option<i64>> {
        Ok(self.value(key).and_then(|v| v.parse().ok()))
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.check_writable()?;
        self.values.lock().remove(key);
        Ok(())
    }

    async fn has_key(&self, key: &str) -> BridgeResult<bool> {
        Ok(self.values.lock().contains_key(key))
    }
}

// ============================================================================
// Device
// ============================================================================

pub struct FakeDevice;

impl DeviceInfo for FakeDevice {
    fn mac_address(&self) -> String {
        "AA:BB:CC:DD:EE:FF".to_string()
    }

    fn firmware_version(&self) -> String {
        "1.4.2".to_string()
    }

    fn signal_strength(&self) -> Option<i32> {
        Some(-61)
    }
}

// ============================================================================
// Audio path
// ============================================================================

/// Serves every request with a 200 and `len` bytes of PCM.
pub struct ToneServer {
    len: u64,
}

impl ToneServer {
    pub fn new(len: u64) -> Arc<Self> {
        Arc::new(Self { len })
    }
}

#[async_trait]
impl HttpClient for ToneServer {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable("buffered requests".to_string()))
    }

    async fn open_stream(&self, _request: HttpRequest) -> BridgeResult<HttpStream> {
        Ok(HttpStream {
            status: 200,
            content_length: Some(self.len),
            headers: HashMap::new(),
            body: Box::new(tokio::io::repeat(0x11).take(self.len)),
        })
    }
}

/// Sink that consumes blocks in real (virtual) time.
pub struct PacedOutput {
    format: PcmFormat,
}

impl PacedOutput {
    pub fn new(format: PcmFormat) -> Arc<Self> {
        Arc::new(Self { format })
    }
}

#[async_trait]
impl AudioOutput for PacedOutput {
    fn format(&self) -> PcmFormat {
        self.format
    }

    async fn start(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn write_block(&self, block: &[u8]) -> BridgeResult<()> {
        let secs = block.len() as f64 / self.format.bytes_per_second() as f64;
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        Ok(())
    }
}
