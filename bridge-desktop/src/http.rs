//! Backend and CDN access over reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStream, RetryPolicy},
};
use futures_util::TryStreamExt;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// [`HttpClient`] on top of a pooled `reqwest::Client` (rustls).
///
/// Small JSON calls go through [`execute`](HttpClient::execute) and are
/// retried per the [`RetryPolicy`]. Audio goes through
/// [`open_stream`](HttpClient::open_stream), which is never retried here:
/// the streaming engine owns reconnects.
pub struct ReqwestHttpClient {
    client: Client,
    retry_policy: RetryPolicy,
}

impl ReqwestHttpClient {
    /// Client sending `user_agent` and giving up on connects after 10 s.
    pub fn new(user_agent: &str) -> Result<Self> {
        Self::with_connect_timeout(user_agent, Duration::from_secs(10))
    }

    pub fn with_connect_timeout(user_agent: &str, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(4)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used by [`HttpClient::execute`]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    /// Build reqwest request from bridge request.
    ///
    /// The total timeout is only applied when `with_total_timeout` is set;
    /// streamed bodies are bounded by the caller's per-read timeout instead.
    fn build_request(&self, request: &HttpRequest, with_total_timeout: bool) -> reqwest::RequestBuilder {
        let mut req = self.client.request(Self::method(request.method), &request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        if with_total_timeout {
            if let Some(total) = request.timeout {
                req = req.timeout(total);
            }
        }

        req
    }

    fn map_error(error: reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Timeout(error.to_string())
        } else if error.is_connect() {
            BridgeError::ConnectionFailed(error.to_string())
        } else {
            BridgeError::OperationFailed(error.to_string())
        }
    }

    fn collect_headers(response: &reqwest::Response) -> HashMap<String, String> {
        response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect()
    }

    /// Send a request, bounding the wait for response headers by the
    /// request's connect timeout when one is set.
    async fn send(&self, request: &HttpRequest, with_total_timeout: bool) -> Result<reqwest::Response> {
        let pending = self.build_request(request, with_total_timeout).send();

        match request.connect_timeout {
            Some(limit) => timeout(limit, pending)
                .await
                .map_err(|_| {
                    BridgeError::Timeout(format!(
                        "No response from {} within {}ms",
                        request.url,
                        limit.as_millis()
                    ))
                })?
                .map_err(Self::map_error),
            None => pending.await.map_err(Self::map_error),
        }
    }

    /// Buffered request, retried on connection errors, 5xx and 429.
    async fn execute_with_retry(&self, request: HttpRequest) -> Result<HttpResponse> {
        let policy = &self.retry_policy;
        let mut failure = BridgeError::OperationFailed(format!("no attempt made for {}", request.url));

        for attempt in 1..=policy.max_attempts {
            if attempt > 1 {
                let pause = policy.delay_for_attempt(attempt - 1);
                debug!(attempt, pause_ms = pause.as_millis() as u64, "Backing off before retry");
                sleep(pause).await;
            }

            let response = match self.send(&request, true).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url = %request.url, attempt, error = %e, "Request failed");
                    failure = e;
                    continue;
                }
            };

            let status = response.status().as_u16();
            if status == 429 || status >= 500 {
                warn!(url = %request.url, attempt, status, "Server asked us to retry");
                failure = BridgeError::OperationFailed(format!("HTTP {}", status));
                continue;
            }

            let headers = Self::collect_headers(&response);
            let body = response.bytes().await.map_err(Self::map_error)?;
            debug!(url = %request.url, status, bytes = body.len(), "Request complete");
            return Ok(HttpResponse {
                status,
                headers,
                body,
            });
        }

        Err(failure)
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request).await
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<HttpStream> {
        debug!(url = %request.url, "Opening HTTP stream");

        let response = self.send(&request, false).await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();
        let headers = Self::collect_headers(&response);

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);

        Ok(HttpStream {
            status,
            content_length,
            headers,
            body: Box::new(reader),
        })
    }
}
