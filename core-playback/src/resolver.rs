//! # Default Track Resolution
//!
//! Looks up the track assigned to this device when playback is requested
//! without a URL (button press on an idle device, boot-time autoplay).

use crate::descriptor::TrackId;
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::{HttpClient, HttpRequest};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Name shown for a resolved track when the backend does not supply one.
pub const DEFAULT_TRACK_NAME: &str = "Default Bhajan";

/// A playable track returned by a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub url: String,
    pub name: String,
    pub track_id: TrackId,
}

/// Source of the device's default track.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DefaultTrackResolver: Send + Sync {
    /// Resolve the track to play. `known_default` is the locally persisted
    /// default id, used when the backend response carries none.
    async fn resolve(&self, known_default: TrackId) -> Result<ResolvedTrack>;
}

#[derive(Debug, Deserialize)]
struct DeviceTrackResponse {
    url: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    bhajan_id: Option<i64>,
}

/// Resolves the default track through the backend device endpoint:
/// `GET {base}/api/devices/by-mac/{mac}/bhajan`.
pub struct BackendTrackResolver {
    http: Arc<dyn HttpClient>,
    base_url: String,
    mac_address: String,
    user_agent: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl BackendTrackResolver {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        mac_address: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            mac_address: mac_address.into(),
            user_agent: user_agent.into(),
            auth_token: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/api/devices/by-mac/{}/bhajan",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.mac_address)
        )
    }
}

#[async_trait]
impl DefaultTrackResolver for BackendTrackResolver {
    #[instrument(skip(self), fields(mac = %self.mac_address))]
    async fn resolve(&self, known_default: TrackId) -> Result<ResolvedTrack> {
        let mut request = HttpRequest::get(self.endpoint())
            .user_agent(&self.user_agent)
            .timeout(self.timeout);
        if let Some(token) = &self.auth_token {
            request = request.bearer_token(token);
        }

        let response = self
            .http
            .execute(request)
            .await
            .map_err(PlaybackError::from_fetch)?;

        if !response.is_success() {
            warn!(status = response.status, "Default track endpoint failed");
            return Err(PlaybackError::HttpStatus(response.status));
        }

        let body: DeviceTrackResponse = response.json()?;
        let url = body
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PlaybackError::NoTrack("response carried no url".to_string()))?;

        let track_id = body.bhajan_id.map(TrackId).unwrap_or(known_default);
        debug!(track_id = %track_id, "Resolved default track");

        Ok(ResolvedTrack {
            url,
            name: body.name.unwrap_or_else(|| DEFAULT_TRACK_NAME.to_string()),
            track_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, HttpResponse, HttpStream};
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct CannedHttp {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpClient for CannedHttp {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.seen.lock().push(request);
            Ok(HttpResponse {
                status: self.status,
                headers: HashMap::new(),
                body: Bytes::from_static(self.body.as_bytes()),
            })
        }

        async fn open_stream(&self, _request: HttpRequest) -> BridgeResult<HttpStream> {
            Err(BridgeError::NotAvailable("not used".into()))
        }
    }

    fn make_resolver(status: u16, body: &'static str) -> (Arc<CannedHttp>, BackendTrackResolver) {
        let http = Arc::new(CannedHttp {
            status,
            body,
            seen: Mutex::new(Vec::new()),
        });
        let resolver = BackendTrackResolver::new(
            http.clone(),
            "http://backend.local:3000/",
            "AA:BB:CC:DD:EE:FF",
            "ESP32-Bhajan-Player/1.0",
        )
        .with_auth_token(Some("tok".to_string()));
        (http, resolver)
    }

    #[tokio::test]
    async fn test_resolves_url_and_encodes_mac() {
        let (http, resolver) = make_resolver(200, r#"{"url":"http://cdn/a.pcm"}"#);

        let track = resolver.resolve(TrackId(4)).await.unwrap();
        assert_eq!(track.url, "http://cdn/a.pcm");
        assert_eq!(track.name, DEFAULT_TRACK_NAME);
        assert_eq!(track.track_id, TrackId(4));

        let seen = http.seen.lock();
        assert_eq!(
            seen[0].url,
            "http://backend.local:3000/api/devices/by-mac/AA%3ABB%3ACC%3ADD%3AEE%3AFF/bhajan"
        );
        assert_eq!(
            seen[0].headers.get("Authorization"),
            Some(&"Bearer tok".to_string())
        );
    }

    #[tokio::test]
    async fn test_backend_track_id_wins() {
        let (_, resolver) =
            make_resolver(200, r#"{"url":"http://cdn/b.pcm","name":"Aarti","bhajan_id":9}"#);
        let track = resolver.resolve(TrackId(4)).await.unwrap();
        assert_eq!(track.track_id, TrackId(9));
        assert_eq!(track.name, "Aarti");
    }

    #[tokio::test]
    async fn test_missing_url_and_bad_status() {
        let (_, resolver) = make_resolver(200, r#"{"name":"x"}"#);
        assert!(matches!(
            resolver.resolve(TrackId::NONE).await,
            Err(PlaybackError::NoTrack(_))
        ));

        let (_, resolver) = make_resolver(404, "{}");
        assert!(matches!(
            resolver.resolve(TrackId::NONE).await,
            Err(PlaybackError::HttpStatus(404))
        ));
    }
}
