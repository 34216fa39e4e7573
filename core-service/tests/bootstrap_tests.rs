//! Service bootstrap with in-memory bridges.

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioOutput, BridgeError, CompetingAudio, ControlTransport, DeviceInfo, HttpClient,
    HttpRequest, HttpResponse, HttpStream, PcmFormat, SecureStore, SettingsStore, TransportEvent,
};
use bytes::Bytes;
use core_playback::{PlaybackState, TrackId};
use core_runtime::config::DeviceConfig;
use core_runtime::events::{CoreEvent, PlaybackEvent, Receiver};
use core_service::{bootstrap, CoreError, ServiceOptions, AUTH_TOKEN_KEY};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

const FORMAT: PcmFormat = PcmFormat::new(8_000, 1, 16);

#[derive(Default)]
struct MemorySettings(Mutex<HashMap<String, i64>>);

impl MemorySettings {
    fn with(values: &[(&str, i64)]) -> Arc<Self> {
        let map = values.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Arc::new(Self(Mutex::new(map)))
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
        Err(BridgeError::NotAvailable("strings".into()))
    }
    async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
        Ok(None)
    }
    async fn set_i64(&self, key: &str, value: i64) -> BridgeResult<()> {
        self.0.lock().insert(key.to_string(), value);
        Ok(())
    }
    async fn get_i64(&self, key: &str) -> BridgeResult<Option<i64>> {
        Ok(self.0.lock().get(key).copied())
    }
    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.0.lock().remove(key);
        Ok(())
    }
    async fn has_key(&self, key: &str) -> BridgeResult<bool> {
        Ok(self.0.lock().contains_key(key))
    }
}

struct OneSecret(&'static str);

#[async_trait]
impl SecureStore for OneSecret {
    async fn set_secret(&self, _key: &str, _value: &[u8]) -> BridgeResult<()> {
        Ok(())
    }
    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok((key == AUTH_TOKEN_KEY).then(|| self.0.as_bytes().to_vec()))
    }
    async fn delete_secret(&self, _key: &str) -> BridgeResult<()> {
        Ok(())
    }
}

/// Never connects and never produces an event.
struct IdleTransport {
    _tx: tokio::sync::mpsc::Sender<TransportEvent>,
    rx: tokio::sync::Mutex<tokio::sync::mpsc::Receiver<TransportEvent>>,
}

impl IdleTransport {
    fn new() -> Arc<Self> {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        Arc::new(Self {
            _tx: tx,
            rx: tokio::sync::Mutex::new(rx),
        })
    }
}

#[async_trait]
impl ControlTransport for IdleTransport {
    fn is_connected(&self) -> bool {
        false
    }
    async fn send_text(&self, _text: String) -> BridgeResult<()> {
        Err(BridgeError::NotAvailable("offline".into()))
    }
    async fn next_event(&self) -> BridgeResult<Option<TransportEvent>> {
        Ok(self.rx.lock().await.recv().await)
    }
}

struct Board;

impl DeviceInfo for Board {
    fn mac_address(&self) -> String {
        "AA:BB:CC:DD:EE:FF".to_string()
    }
    fn firmware_version(&self) -> String {
        "2.0.0".to_string()
    }
}

/// Backend + CDN: the device endpoint names one fixed track; any stream
/// request gets `secs` seconds of PCM.
struct Backend {
    secs: u64,
    execute_seen: Mutex<Vec<HttpRequest>>,
    stream_seen: Mutex<Vec<HttpRequest>>,
}

impl Backend {
    fn new(secs: u64) -> Arc<Self> {
        Arc::new(Self {
            secs,
            execute_seen: Mutex::new(Vec::new()),
            stream_seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl HttpClient for Backend {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.execute_seen.lock().push(request);
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from_static(
                br#"{"url":"http://cdn/default.pcm","name":"Morning","bhajan_id":21}"#,
            ),
        })
    }

    async fn open_stream(&self, request: HttpRequest) -> BridgeResult<HttpStream> {
        self.stream_seen.lock().push(request);
        let len = FORMAT.bytes_per_second() * self.secs;
        Ok(HttpStream {
            status: 200,
            content_length: Some(len),
            headers: HashMap::new(),
            body: Box::new(tokio::io::repeat(0).take(len)),
        })
    }
}

struct PacedOutput;

#[async_trait]
impl AudioOutput for PacedOutput {
    fn format(&self) -> PcmFormat {
        FORMAT
    }
    async fn start(&self) -> BridgeResult<()> {
        Ok(())
    }
    async fn write_block(&self, block: &[u8]) -> BridgeResult<()> {
        let secs = block.len() as f64 / FORMAT.bytes_per_second() as f64;
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        Ok(())
    }
    async fn stop(&self) -> BridgeResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPath {
    suspends: AtomicUsize,
    resumes: AtomicUsize,
}

#[async_trait]
impl CompetingAudio for RecordingPath {
    async fn suspend(&self) -> BridgeResult<()> {
        self.suspends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn resume(&self) -> BridgeResult<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn config(
    settings: Arc<MemorySettings>,
    http: Arc<Backend>,
    competing: Option<Arc<RecordingPath>>,
) -> DeviceConfig {
    let mut builder = DeviceConfig::builder()
        .backend_base_url("http://backend.local")
        .http_client(http)
        .file_system(Arc::new(TokioFileSystem::new()))
        .settings_store(settings)
        .secure_store(Arc::new(OneSecret("secret-token")))
        .audio_output(Arc::new(PacedOutput))
        .control_transport(IdleTransport::new())
        .device_info(Arc::new(Board));
    if let Some(competing) = competing {
        builder = builder.competing_audio(competing);
    }
    builder.build().unwrap()
}

async fn wait_for<F>(rx: &mut Receiver<CoreEvent>, pred: F)
where
    F: Fn(&PlaybackEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            if let Ok(CoreEvent::Playback(event)) = rx.recv().await {
                if pred(&event) {
                    return;
                }
            }
        }
    })
    .await
    .expect("event never arrived");
}

#[tokio::test(start_paused = true)]
async fn test_boot_restores_persisted_state() {
    let settings = MemorySettings::with(&[("default_bhajan_id", 12), ("bhajan_volume", 40)]);
    let service = bootstrap(config(settings, Backend::new(1), None), ServiceOptions::default())
        .await
        .unwrap();

    let controller = service.controller();
    assert_eq!(controller.snapshot().volume, 40);
    assert_eq!(controller.snapshot().state, PlaybackState::Stopped);
    assert_eq!(controller.default_track(), TrackId(12));
    assert_eq!(service.device_id(), "AA:BB:CC:DD:EE:FF");
    assert_eq!(service.running_tasks(), 2);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_volume_falls_back_to_full() {
    let settings = MemorySettings::with(&[("bhajan_volume", 250)]);
    let service = bootstrap(config(settings, Backend::new(1), None), ServiceOptions::default())
        .await
        .unwrap();

    assert_eq!(service.controller().snapshot().volume, 100);
    assert_eq!(service.controller().default_track(), TrackId::NONE);
    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_play_default_resolves_with_stored_credential() {
    let http = Backend::new(2);
    let service = bootstrap(
        config(MemorySettings::with(&[]), http.clone(), None),
        ServiceOptions::default(),
    )
    .await
    .unwrap();
    let mut rx = service.events().subscribe();

    service.play_default().await;
    wait_for(&mut rx, |e| matches!(e, PlaybackEvent::Completed { track_id: 21 })).await;

    let lookup = &http.execute_seen.lock()[0];
    assert!(lookup.url.starts_with("http://backend.local/api/devices/by-mac/"));
    assert_eq!(
        lookup.headers.get("Authorization"),
        Some(&"Bearer secret-token".to_string())
    );

    let fetch = &http.stream_seen.lock()[0];
    assert_eq!(fetch.url, "http://cdn/default.pcm");
    assert_eq!(
        fetch.headers.get("User-Agent"),
        Some(&"ESP32-Bhajan-Player/1.0".to_string())
    );

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_restores_competing_audio() {
    let competing = Arc::new(RecordingPath::default());
    let service = bootstrap(
        config(
            MemorySettings::with(&[]),
            Backend::new(600),
            Some(competing.clone()),
        ),
        ServiceOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(service.running_tasks(), 3);

    let mut rx = service.events().subscribe();
    service
        .controller()
        .start("http://cdn/long.pcm", "Long", TrackId(3))
        .await;
    wait_for(&mut rx, |e| matches!(e, PlaybackEvent::Started { .. })).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(competing.suspends.load(Ordering::SeqCst), 1);

    service.shutdown().await;
    assert_eq!(competing.resumes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_options_are_rejected() {
    let mut options = ServiceOptions::default();
    options.streaming.block_size = 3;

    let result = bootstrap(
        config(MemorySettings::with(&[]), Backend::new(1), None),
        options,
    )
    .await;
    assert!(matches!(result, Err(CoreError::InvalidOptions(_))));
}
