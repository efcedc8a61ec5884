use crate::config::{ApiConfig, RetryConfig, ScrobblerConfig};
use crate::events::{RequestInfo, ScrobblerEvent, ScrobblerEventReceiver, SharedEventBroadcaster};
use crate::response::{IgnoredScrobble, ScrobbleResponse, ScrobbleStatus};
use crate::retry::retry_with_backoff;
use crate::scrobbler::Scrobbler;
use crate::{Result, Scrobble, ScrobbleError, User};
use async_trait::async_trait;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Last.fm error code for "Rate Limit Exceeded".
const RATE_LIMIT_ERROR: u32 = 29;

/// Seconds to wait when Last.fm rate limits without saying for how long.
const DEFAULT_RETRY_AFTER: u64 = 60;

// =============================================================================
// LastFmScrobbler
// =============================================================================

/// Submits scrobbles directly to the Last.fm web service.
///
/// Batches are split into `track.scrobble` requests of at most
/// `batch_size` scrobbles. Requests that Last.fm rate limits are retried with
/// backoff according to the [`RetryConfig`]; every other failure is reported
/// as a non-successful [`ScrobbleResponse`].
///
/// # Examples
///
/// ```rust,no_run
/// use lastfm_scrobble::{ApiConfig, LastFmScrobbler, ScrobblerConfig};
///
/// # tokio_test::block_on(async {
/// let config = ScrobblerConfig::new().with_api(ApiConfig::new("api-key", "api-secret"));
/// let http_client = http_client::native::NativeClient::new();
/// let mut scrobbler = LastFmScrobbler::new(Box::new(http_client), &config);
///
/// let user = scrobbler.authenticate("username", "password").await?;
/// println!("Logged in as {}", user.username);
/// # Ok::<(), lastfm_scrobble::ScrobbleError>(())
/// # });
/// ```
#[derive(Clone)]
pub struct LastFmScrobbler {
    client: Arc<dyn HttpClient + Send + Sync>,
    api: ApiConfig,
    retry: RetryConfig,
    batch_size: usize,
    session_key: Option<String>,
    broadcaster: Arc<SharedEventBroadcaster>,
}

impl LastFmScrobbler {
    pub fn new(client: Box<dyn HttpClient + Send + Sync>, config: &ScrobblerConfig) -> Self {
        Self {
            client: Arc::from(client),
            api: config.api.clone(),
            retry: config.retry.clone(),
            batch_size: config.batch_size.max(1),
            session_key: None,
            broadcaster: Arc::new(SharedEventBroadcaster::new()),
        }
    }

    /// Create a scrobbler that reuses the session stored on `user`.
    pub fn from_user(
        client: Box<dyn HttpClient + Send + Sync>,
        config: &ScrobblerConfig,
        user: &User,
    ) -> Self {
        let mut scrobbler = Self::new(client, config);
        if user.is_valid() {
            scrobbler.session_key = Some(user.session_key.clone());
        }
        scrobbler
    }

    /// Report events through an existing broadcaster instead of a private one.
    pub fn with_broadcaster(mut self, broadcaster: SharedEventBroadcaster) -> Self {
        self.broadcaster = Arc::new(broadcaster);
        self
    }

    pub fn subscribe(&self) -> ScrobblerEventReceiver {
        self.broadcaster.subscribe()
    }

    pub fn latest_event(&self) -> Option<ScrobblerEvent> {
        self.broadcaster.latest_event()
    }

    /// Log in with `auth.getMobileSession` and keep the session key.
    ///
    /// Returns the authenticated [`User`] so it can be persisted.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<User> {
        let mut params = BTreeMap::new();
        params.insert("method".to_string(), "auth.getMobileSession".to_string());
        params.insert("username".to_string(), username.to_string());
        params.insert("password".to_string(), password.to_string());
        params.insert("api_key".to_string(), self.api.api_key.clone());
        let params = self.signed(params);

        let request = RequestInfo::new("POST", "auth.getMobileSession", 0);
        let session = retry_with_backoff(
            &self.retry,
            "auth.getMobileSession",
            || self.request_session(&params, &request),
            |delay, _| self.report_rate_limit(delay, &request),
        )
        .await?
        .result;

        log::info!("Authenticated with Last.fm as {}", session.name);
        self.session_key = Some(session.key.clone());

        Ok(User::new(
            session.name,
            session.key,
            session.subscriber.as_u64() != 0,
        ))
    }

    async fn request_session(
        &self,
        params: &BTreeMap<String, String>,
        request_info: &RequestInfo,
    ) -> Result<ApiSession> {
        let (status_code, body) = self.post(params, request_info).await?;
        if status_code == 429 {
            return Err(ScrobbleError::RateLimit {
                retry_after: DEFAULT_RETRY_AFTER,
            });
        }

        if let Ok(error) = serde_json::from_str::<ApiErrorBody>(&body) {
            if error.error == RATE_LIMIT_ERROR {
                return Err(ScrobbleError::RateLimit {
                    retry_after: DEFAULT_RETRY_AFTER,
                });
            }
            log::debug!("Login refused: {} {}", error.error, error.message);
            return Err(ScrobbleError::Auth(error.message));
        }

        serde_json::from_str::<ApiSessionResponse>(&body)
            .map(|response| response.session)
            .map_err(|e| {
                ScrobbleError::Parse(format!(
                    "HTTP {status_code}: unexpected session response: {e}"
                ))
            })
    }

    fn report_rate_limit(&self, delay: u64, request_info: &RequestInfo) {
        self.broadcaster
            .broadcast_event(ScrobblerEvent::RateLimited {
                delay_seconds: delay,
                request: request_info.clone(),
            });
    }

    fn signed(&self, mut params: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let signature = sign_params(&params, &self.api.api_secret);
        params.insert("api_sig".to_string(), signature);
        params.insert("format".to_string(), "json".to_string());
        params
    }

    async fn post(
        &self,
        params: &BTreeMap<String, String>,
        request_info: &RequestInfo,
    ) -> Result<(u16, String)> {
        let url = self
            .api
            .base_url
            .parse::<Url>()
            .map_err(|e| ScrobbleError::Http(format!("Invalid API URL {}: {e}", self.api.base_url)))?;

        let mut request = Request::new(Method::Post, url);
        request.insert_header("Content-Type", "application/x-www-form-urlencoded");
        request.insert_header(
            "User-Agent",
            concat!("lastfm-scrobble/", env!("CARGO_PKG_VERSION")),
        );
        request.set_body(encode_form(params));

        let request_start = std::time::Instant::now();
        self.broadcaster
            .broadcast_event(ScrobblerEvent::RequestStarted {
                request: request_info.clone(),
            });

        let mut response = self
            .client
            .send(request)
            .await
            .map_err(|e| ScrobbleError::Http(e.to_string()))?;

        let status_code: u16 = response.status().into();
        self.broadcaster
            .broadcast_event(ScrobblerEvent::RequestCompleted {
                request: request_info.clone(),
                status_code,
                duration_ms: request_start.elapsed().as_millis() as u64,
            });
        log::debug!("{} -> {status_code}", request_info.short_description());

        let body = response
            .body_string()
            .await
            .map_err(|e| ScrobbleError::Http(e.to_string()))?;

        Ok((status_code, body))
    }

    async fn send_scrobble_request(
        &self,
        params: &BTreeMap<String, String>,
        request_info: &RequestInfo,
    ) -> Result<ScrobbleResponse> {
        let (status_code, body) = self.post(params, request_info).await?;
        if status_code == 429 {
            return Err(ScrobbleError::RateLimit {
                retry_after: DEFAULT_RETRY_AFTER,
            });
        }
        parse_scrobble_response(status_code, &body)
    }

    async fn scrobble_chunk(&self, session_key: &str, chunk: &[Scrobble]) -> ScrobbleResponse {
        let params = self.signed(build_scrobble_params(chunk, &self.api.api_key, session_key));
        let request_info = RequestInfo::new("POST", "track.scrobble", chunk.len());

        let outcome = retry_with_backoff(
            &self.retry,
            "track.scrobble",
            || self.send_scrobble_request(&params, &request_info),
            |delay, _| self.report_rate_limit(delay, &request_info),
        )
        .await;

        match outcome {
            Ok(retried) => retried.result,
            Err(ScrobbleError::RateLimit { .. }) => {
                ScrobbleResponse::api_error(RATE_LIMIT_ERROR, "Rate limit exceeded")
            }
            Err(e) => {
                log::warn!("track.scrobble request failed: {e}");
                ScrobbleResponse::failed(ScrobbleStatus::RequestFailed, e.to_string())
            }
        }
    }
}

#[async_trait(?Send)]
impl Scrobbler for LastFmScrobbler {
    fn is_authenticated(&self) -> bool {
        self.session_key.is_some()
    }

    async fn scrobble(&self, scrobbles: &[Scrobble]) -> Result<ScrobbleResponse> {
        if scrobbles.is_empty() {
            return Ok(ScrobbleResponse::successful(0, Vec::new()));
        }
        let Some(session_key) = self.session_key.as_deref() else {
            return Ok(ScrobbleResponse::failed(
                ScrobbleStatus::BadAuth,
                "No Last.fm session, authenticate first",
            ));
        };

        let mut response = ScrobbleResponse::successful(0, Vec::new());
        for chunk in scrobbles.chunks(self.batch_size) {
            let chunk_response = self.scrobble_chunk(session_key, chunk).await;
            let chunk_ok = chunk_response.success();
            response.merge(chunk_response);
            if !chunk_ok {
                log::warn!(
                    "Stopping after failed chunk: {:?} ({} of {} accepted so far)",
                    response.status,
                    response.accepted,
                    scrobbles.len()
                );
                break;
            }
        }

        log::info!(
            "Submitted {} scrobbles: {:?}, {} accepted, {} ignored",
            scrobbles.len(),
            response.status,
            response.accepted,
            response.ignored.len()
        );
        Ok(response)
    }
}

// =============================================================================
// Request building and signing
// =============================================================================

/// Compute the `api_sig` for a set of parameters.
///
/// Parameters are concatenated as `key value` pairs in key order, followed by
/// the shared secret, and hashed with MD5. `format` and `callback` are not
/// signed.
pub fn sign_params(params: &BTreeMap<String, String>, secret: &str) -> String {
    let mut signature_base = String::new();
    for (key, value) in params {
        if key == "format" || key == "callback" {
            continue;
        }
        signature_base.push_str(key);
        signature_base.push_str(value);
    }
    signature_base.push_str(secret);

    format!("{:x}", md5::compute(signature_base.as_bytes()))
}

/// Build the unsigned `track.scrobble` parameters for one request.
pub fn build_scrobble_params(
    scrobbles: &[Scrobble],
    api_key: &str,
    session_key: &str,
) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("method".to_string(), "track.scrobble".to_string());
    params.insert("api_key".to_string(), api_key.to_string());
    params.insert("sk".to_string(), session_key.to_string());

    for (i, scrobble) in scrobbles.iter().enumerate() {
        params.insert(format!("artist[{i}]"), scrobble.artist().to_string());
        params.insert(format!("track[{i}]"), scrobble.track().to_string());
        params.insert(
            format!("timestamp[{i}]"),
            scrobble.played_at().timestamp().to_string(),
        );
        if let Some(album) = scrobble.album() {
            params.insert(format!("album[{i}]"), album.to_string());
        }
        if let Some(album_artist) = scrobble.album_artist() {
            params.insert(format!("albumArtist[{i}]"), album_artist.to_string());
        }
        if let Some(duration) = scrobble.duration() {
            params.insert(format!("duration[{i}]"), duration.as_secs().to_string());
        }
    }

    params
}

fn encode_form(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

// =============================================================================
// Response parsing
// =============================================================================

/// Last.fm sends some numbers as JSON numbers and some as strings.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum ApiNumber {
    Number(u64),
    Text(String),
}

impl ApiNumber {
    pub fn as_u64(&self) -> u64 {
        match self {
            ApiNumber::Number(n) => *n,
            ApiNumber::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Deserialize)]
pub struct ApiErrorBody {
    pub error: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
pub struct ApiSessionResponse {
    pub session: ApiSession,
}

#[derive(Deserialize)]
pub struct ApiSession {
    pub name: String,
    pub key: String,
    pub subscriber: ApiNumber,
}

#[derive(Deserialize)]
pub struct ApiScrobbleEnvelope {
    pub scrobbles: ApiScrobbles,
}

#[derive(Deserialize)]
pub struct ApiScrobbles {
    #[serde(default)]
    pub scrobble: Option<OneOrMany<ApiScrobbleResult>>,
    #[serde(rename = "@attr")]
    pub attr: ApiScrobbleAttr,
}

#[derive(Deserialize)]
pub struct ApiScrobbleAttr {
    pub accepted: ApiNumber,
    pub ignored: ApiNumber,
}

#[derive(Deserialize)]
pub struct ApiScrobbleResult {
    pub artist: ApiTextField,
    pub track: ApiTextField,
    #[serde(rename = "ignoredMessage")]
    pub ignored_message: ApiIgnoredMessage,
}

#[derive(Deserialize)]
pub struct ApiTextField {
    #[serde(rename = "#text", default)]
    pub text: String,
}

#[derive(Deserialize)]
pub struct ApiIgnoredMessage {
    pub code: ApiNumber,
    #[serde(rename = "#text", default)]
    pub text: String,
}

/// Turn a `track.scrobble` response body into a [`ScrobbleResponse`].
///
/// Rate limiting is returned as [`ScrobbleError::RateLimit`] so the caller can
/// retry it.
pub fn parse_scrobble_response(status_code: u16, body: &str) -> Result<ScrobbleResponse> {
    if let Ok(error) = serde_json::from_str::<ApiErrorBody>(body) {
        if error.error == RATE_LIMIT_ERROR {
            return Err(ScrobbleError::RateLimit {
                retry_after: DEFAULT_RETRY_AFTER,
            });
        }
        return Ok(ScrobbleResponse::api_error(error.error, error.message));
    }

    let envelope: ApiScrobbleEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&status_code) => {
            return Ok(ScrobbleResponse::failed(
                ScrobbleStatus::RequestFailed,
                format!("HTTP {status_code}"),
            ));
        }
        Err(e) => return Err(ScrobbleError::Parse(e.to_string())),
    };

    let ignored = envelope
        .scrobbles
        .scrobble
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|result| {
            let code = result.ignored_message.code.as_u64() as u32;
            (code != 0).then(|| IgnoredScrobble {
                artist: result.artist.text,
                track: result.track.text,
                code,
                message: result.ignored_message.text,
            })
        })
        .collect::<Vec<_>>();

    let accepted = envelope.scrobbles.attr.accepted.as_u64() as usize;
    let ignored_count = envelope.scrobbles.attr.ignored.as_u64() as usize;
    if ignored_count != ignored.len() {
        log::debug!(
            "Last.fm reported {ignored_count} ignored scrobbles but listed {}",
            ignored.len()
        );
    }

    Ok(ScrobbleResponse::successful(accepted, ignored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    #[test]
    fn test_sign_params_skips_format() {
        let mut params = BTreeMap::new();
        params.insert("method".to_string(), "track.scrobble".to_string());
        params.insert("api_key".to_string(), "key".to_string());
        params.insert("sk".to_string(), "session".to_string());
        params.insert("track[0]".to_string(), "Creep".to_string());
        params.insert("format".to_string(), "json".to_string());

        assert_eq!(
            sign_params(&params, "secret"),
            "a1e2b8e01ad09c28a246131ba8807e39"
        );
    }

    #[test]
    fn test_build_scrobble_params() {
        let scrobble = Scrobble::new(
            "Radiohead",
            "Creep",
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
        .unwrap()
        .with_album("Pablo Honey")
        .with_duration(Duration::from_secs(238));

        let params = build_scrobble_params(&[scrobble], "key", "session");

        assert_eq!(params["artist[0]"], "Radiohead");
        assert_eq!(params["timestamp[0]"], "1700000000");
        assert_eq!(params["duration[0]"], "238");
        assert!(!params.contains_key("albumArtist[0]"));
        assert_eq!(
            sign_params(&params, "secret"),
            "2e5f1fbad27c3caabac8a5a012c0ba0d"
        );
    }

    #[test]
    fn test_encode_form() {
        let mut params = BTreeMap::new();
        params.insert("artist[0]".to_string(), "Simon & Garfunkel".to_string());
        assert_eq!(encode_form(&params), "artist%5B0%5D=Simon%20%26%20Garfunkel");
    }

    #[test]
    fn test_parse_single_accepted_scrobble() {
        let json = r##"{
            "scrobbles": {
                "scrobble": {
                    "artist": {"corrected": "0", "#text": "Radiohead"},
                    "track": {"corrected": "0", "#text": "Creep"},
                    "album": {"corrected": "0", "#text": ""},
                    "timestamp": "1700000000",
                    "ignoredMessage": {"code": "0", "#text": ""}
                },
                "@attr": {"accepted": 1, "ignored": 0}
            }
        }"##;

        let response = parse_scrobble_response(200, json).unwrap();
        assert!(response.success());
        assert_eq!(response.accepted, 1);
        assert!(response.ignored.is_empty());
    }

    #[test]
    fn test_parse_ignored_scrobbles() {
        let json = r##"{
            "scrobbles": {
                "scrobble": [
                    {
                        "artist": {"#text": "Radiohead"},
                        "track": {"#text": "Creep"},
                        "ignoredMessage": {"code": "0", "#text": ""}
                    },
                    {
                        "artist": {"#text": "Wilco"},
                        "track": {"#text": "Impossible Germany"},
                        "ignoredMessage": {"code": "3", "#text": "Timestamp too old"}
                    }
                ],
                "@attr": {"accepted": "1", "ignored": "1"}
            }
        }"##;

        let response = parse_scrobble_response(200, json).unwrap();
        assert!(response.success());
        assert_eq!(response.accepted, 1);
        assert_eq!(
            response.ignored,
            vec![IgnoredScrobble {
                artist: "Wilco".to_string(),
                track: "Impossible Germany".to_string(),
                code: 3,
                message: "Timestamp too old".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_api_error() {
        let json = r#"{"error": 9, "message": "Invalid session key - Please re-authenticate"}"#;
        let response = parse_scrobble_response(403, json).unwrap();

        assert_eq!(response.status, ScrobbleStatus::BadAuth);
        assert_eq!(response.error_code, Some(9));
        assert_eq!(
            response.message.as_deref(),
            Some("Invalid session key - Please re-authenticate")
        );
    }

    #[test]
    fn test_parse_rate_limit_error() {
        let json = r#"{"error": 29, "message": "Rate Limit Exceeded"}"#;
        assert!(matches!(
            parse_scrobble_response(200, json),
            Err(ScrobbleError::RateLimit { .. })
        ));
    }

    #[test]
    fn test_parse_non_json_error_page() {
        let response = parse_scrobble_response(502, "<html>Bad Gateway</html>").unwrap();
        assert_eq!(response.status, ScrobbleStatus::RequestFailed);
        assert_eq!(response.message.as_deref(), Some("HTTP 502"));

        assert!(matches!(
            parse_scrobble_response(200, "not json"),
            Err(ScrobbleError::Parse(_))
        ));
    }
}
