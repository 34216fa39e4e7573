#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioOutput, BridgeError, Clock, FileSystemAccess, HttpClient, HttpRequest,
    HttpResponse, HttpStream, PcmFormat,
};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use core_runtime::events::{CoreEvent, PlaybackEvent, Receiver};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

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
// HTTP
// ============================================================================

/// One step of a scripted response body.
#[derive(Debug, Clone)]
pub enum Chunk {
    Data(Vec<u8>),
    /// Connection reset mid-body.
    Reset,
    /// No data ever arrives.
    Stall,
    /// Nothing arrives for this long (tokio time), then the body continues.
    Wait(Duration),
}

pub struct ScriptedBody {
    chunks: VecDeque<Chunk>,
    delay: Option<Pin<Box<tokio::time::Sleep>>>,
}

impl AsyncRead for ScriptedBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.chunks.pop_front() {
            None => Poll::Ready(Ok(())),
            Some(Chunk::Data(mut data)) => {
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    self.chunks.push_front(Chunk::Data(rest));
                }
                Poll::Ready(Ok(()))
            }
            Some(Chunk::Reset) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "reset by peer",
            ))),
            Some(Chunk::Stall) => {
                self.chunks.push_front(Chunk::Stall);
                Poll::Pending
            }
            Some(Chunk::Wait(period)) => {
                let delay = self
                    .delay
                    .get_or_insert_with(|| Box::pin(tokio::time::sleep(period)));
                if delay.as_mut().poll(cx).is_pending() {
                    self.chunks.push_front(Chunk::Wait(period));
                    return Poll::Pending;
                }
                self.delay = None;
                self.poll_read(cx, buf)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Refused,
    Status(u16),
    Body {
        status: u16,
        content_length: Option<u64>,
        chunks: Vec<Chunk>,
    },
}

impl Reply {
    /// 200 with the whole payload split into `chunk` sized pieces.
    pub fn ok(payload: &[u8], chunk: usize) -> Self {
        Reply::Body {
            status: 200,
            content_length: Some(payload.len() as u64),
            chunks: payload
                .chunks(chunk)
                .map(|c| Chunk::Data(c.to_vec()))
                .collect(),
        }
    }
}

/// Answers `open_stream` calls from a queue; an empty queue refuses.
#[derive(Default)]
pub struct ScriptedHttp {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    /// Reply used once the queue is drained.
    pub fn always(reply: Reply) -> Arc<Self> {
        let http = Self::default();
        *http.fallback.lock() = Some(reply);
        Arc::new(http)
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable("buffered requests not scripted".into()))
    }

    async fn open_stream(&self, request: HttpRequest) -> BridgeResult<HttpStream> {
        self.seen.lock().push(request);
        let reply = self
            .replies
            .lock()
            .pop_front()
            .or_else(|| self.fallback.lock().clone());

        match reply {
            None | Some(Reply::Refused) => {
                Err(BridgeError::ConnectionFailed("connection refused".into()))
            }
            Some(Reply::Status(status)) => Ok(HttpStream {
                status,
                content_length: None,
                headers: HashMap::new(),
                body: Box::new(tokio::io::empty()),
            }),
            Some(Reply::Body {
                status,
                content_length,
                chunks,
            }) => Ok(HttpStream {
                status,
                content_length,
                headers: HashMap::new(),
                body: Box::new(ScriptedBody {
                    chunks: chunks.into(),
                    delay: None,
                }),
            }),
        }
    }
}

// ============================================================================
// Audio output
// ============================================================================

/// Collects written PCM and blocks for each block's play time on the tokio
/// clock. Optionally advances a manual wall clock by the same amount.
pub struct RecordingOutput {
    format: PcmFormat,
    written: Mutex<Vec<u8>>,
    blocks: Mutex<usize>,
    clock: Option<Arc<ManualClock>>,
}

impl RecordingOutput {
    pub fn new(format: PcmFormat) -> Arc<Self> {
        Arc::new(Self {
            format,
            written: Mutex::new(Vec::new()),
            blocks: Mutex::new(0),
            clock: None,
        })
    }

    pub fn clocked(format: PcmFormat, clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            format,
            written: Mutex::new(Vec::new()),
            blocks: Mutex::new(0),
            clock: Some(clock),
        })
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    pub fn bytes_written(&self) -> usize {
        self.written.lock().len()
    }

    pub fn blocks(&self) -> usize {
        *self.blocks.lock()
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    fn format(&self) -> PcmFormat {
        self.format
    }

    async fn start(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn write_block(&self, block: &[u8]) -> BridgeResult<()> {
        self.written.lock().extend_from_slice(block);
        *self.blocks.lock() += 1;
        let millis = block.len() as u64 * 1000 / self.format.bytes_per_second();
        tokio::time::sleep(Duration::from_millis(millis)).await;
        if let Some(clock) = &self.clock {
            clock.advance_millis(millis as i64);
        }
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        Ok(())
    }
}

// ============================================================================
// File system
// ============================================================================

type Files = Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>;

pub struct MemoryFs {
    root: PathBuf,
    files: Files,
    read_only: bool,
}

impl MemoryFs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            root: PathBuf::from("/cache"),
            files: Arc::default(),
            read_only: false,
        })
    }

    pub fn read_only() -> Arc<Self> {
        Arc::new(Self {
            root: PathBuf::from("/cache"),
            files: Arc::default(),
            read_only: true,
        })
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(Path::new(path)).cloned()
    }

    fn check_writable(&self) -> BridgeResult<()> {
        if self.read_only {
            Err(BridgeError::OperationFailed("read-only filesystem".into()))
        } else {
            Ok(())
        }
    }
}

struct MemoryWriter {
    path: PathBuf,
    files: Files,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.files
            .lock()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFs {
    async fn cache_root(&self) -> BridgeResult<PathBuf> {
        Ok(self.root.clone())
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.files.lock().contains_key(path))
    }

    async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
        self.check_writable()
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .map(Bytes::from)
            .ok_or_else(|| BridgeError::OperationFailed(format!("{:?} not found", path)))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.check_writable()?;
        self.files.lock().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        self.files.lock().remove(path);
        Ok(())
    }

    async fn open_read_stream(
        &self,
        path: &Path,
    ) -> BridgeResult<Box<dyn AsyncRead + Send + Unpin>> {
        let data = self.read_file(path).await?;
        Ok(Box::new(io::Cursor::new(data.to_vec())))
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> BridgeResult<Box<dyn AsyncWrite + Send + Unpin>> {
        self.check_writable()?;
        self.files.lock().insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            files: self.files.clone(),
        }))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Little-endian PCM ramp of `len` bytes.
pub fn pcm_payload(len: usize) -> Vec<u8> {
    (0..len / 2)
        .flat_map(|i| ((i % 2000) as i16 - 1000).to_le_bytes())
        .collect()
}

/// Next playback event matching `pred`, or panic after ten minutes of
/// (virtual) time.
pub async fn wait_for<F>(rx: &mut Receiver<CoreEvent>, mut pred: F) -> PlaybackEvent
where
    F: FnMut(&PlaybackEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            match rx.recv().await {
                Ok(CoreEvent::Playback(event)) if pred(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event bus closed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for playback event")
}

/// Poll `cond` every 10ms of virtual time.
pub async fn wait_until<F>(mut cond: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(600), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}

pub fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<PlaybackEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Playback(event) = event {
            out.push(event);
        }
    }
    out
}
