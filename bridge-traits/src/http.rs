//! HTTP access.
//!
//! Two shapes of call: a buffered one for the backend's small JSON
//! endpoints and a streamed one for audio bodies that are far larger than
//! device memory.

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

/// Outgoing request, assembled with the chained setters.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Overall request timeout (buffered calls).
    pub timeout: Option<Duration>,
    /// Maximum time to establish the connection and receive response headers.
    pub connect_timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
            connect_timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    pub fn user_agent(self, agent: impl Into<String>) -> Self {
        self.header("User-Agent", agent)
    }

    /// Request the body starting at `offset` bytes.
    pub fn range_from(self, offset: u64) -> Self {
        self.header("Range", format!("bytes={}-", offset))
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }
}

/// Fully buffered response.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Streamed HTTP response.
///
/// The body is handed out as an [`AsyncRead`](core_async::io::AsyncRead) so
/// callers can pull fixed-size blocks at their own pace and apply their own
/// per-read timeouts.
pub struct HttpStream {
    pub status: u16,
    /// Body length as reported by the server, when known.
    pub content_length: Option<u64>,
    pub headers: HashMap<String, String>,
    pub body: Box<dyn core_async::io::AsyncRead + Send + Unpin>,
}

impl fmt::Debug for HttpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStream")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// How many times a failed call is tried and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Ceiling for the doubled delay.
    pub max_delay: Duration,
    /// Double the delay after every failure.
    pub use_exponential_backoff: bool,
}

impl RetryPolicy {
    /// Constant delay between a bounded number of attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            use_exponential_backoff: false,
        }
    }

    /// Delay to wait after the given 1-based failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.use_exponential_backoff {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            self.base_delay.saturating_mul(factor).min(self.max_delay)
        } else {
            self.base_delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

/// Host HTTP stack.
///
/// Implementations map transport failures onto
/// [`BridgeError::ConnectionFailed`] and [`BridgeError::Timeout`] so callers
/// can tell network trouble from local faults. Non-2xx statuses are returned
/// as responses, not errors.
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn fetch(client: &dyn HttpClient) -> Result<u16> {
///     let stream = client
///         .open_stream(HttpRequest::get("https://example.com/track.pcm"))
///         .await?;
///     Ok(stream.status)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute a request and buffer the whole body.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute a request and return once headers are received; the body is
    /// read lazily from the returned stream.
    async fn open_stream(&self, request: HttpRequest) -> Result<HttpStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_request_headers() {
        let request = HttpRequest::get("https://example.com/a.pcm")
            .user_agent("test-agent")
            .bearer_token("secret")
            .range_from(4096)
            .connect_timeout(Duration::from_secs(10));

        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(
            request.headers.get("User-Agent"),
            Some(&"test-agent".to_string())
        );
        assert_eq!(
            request.headers.get("Authorization"),
            Some(&"Bearer secret".to_string())
        );
        assert_eq!(
            request.headers.get("Range"),
            Some(&"bytes=4096-".to_string())
        );
        assert_eq!(request.connect_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_fixed_retry_delay() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_retry_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            use_exponential_backoff: true,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
    }

    #[test]
    fn test_backend_response_decodes() {
        let response = HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(r#"{"url":"http://x/y"}"#),
        };
        assert!(response.is_success());
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["url"], "http://x/y");
    }
}
