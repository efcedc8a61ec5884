use crate::user::MAX_SCROBBLES_PER_DAY;
use crate::{Result, ScrobbleError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default Last.fm web service endpoint.
pub const DEFAULT_API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Maximum number of scrobbles Last.fm accepts in one `track.scrobble` call.
pub const MAX_BATCH_SIZE: usize = 50;

/// Longest rolling window accepted by [`ScrobblerConfig::validate`] (one year).
pub const MAX_WINDOW_HOURS: i64 = 24 * 365;

/// Prefix for environment variable overrides, e.g. `LASTFM_SCROBBLE__API__API_KEY`.
pub const ENV_PREFIX: &str = "LASTFM_SCROBBLE";

/// Last.fm API credentials and endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            base_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Configuration for retry behavior when Last.fm rate limits a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (set to 0 to disable retries)
    pub max_retries: u32,
    /// Base delay for exponential backoff (in seconds)
    pub base_delay: u64,
    /// Maximum delay cap (in seconds)
    pub max_delay: u64,
    /// Whether retries are enabled at all
    pub enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: 5,
            max_delay: 300, // 5 minutes
            enabled: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with retries disabled
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            enabled: false,
            ..Default::default()
        }
    }

    /// Create a config with custom retry count
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            enabled: max_retries > 0,
            ..Default::default()
        }
    }

    /// Create a config with custom delays
    pub fn with_delays(base_delay: u64, max_delay: u64) -> Self {
        Self {
            base_delay,
            max_delay,
            ..Default::default()
        }
    }
}

/// Settings for the submission pipeline.
///
/// Passed explicitly to every component that needs it; nothing reads global
/// state. Build one with the `with_*` methods or load it from a TOML file with
/// environment overrides via [`ScrobblerConfig::load`].
///
/// ```toml
/// max_scrobbles_per_day = 2800
/// batch_size = 50
///
/// [api]
/// api_key = "..."
/// api_secret = "..."
///
/// [retry]
/// max_retries = 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrobblerConfig {
    /// Daily cap checked before every submission
    pub max_scrobbles_per_day: usize,
    /// Length of the rolling window in hours
    pub window_hours: i64,
    /// Scrobbles per `track.scrobble` request
    pub batch_size: usize,
    /// Root of the per-user scrobble caches; `None` uses the data directory
    pub cache_dir: Option<PathBuf>,
    pub api: ApiConfig,
    pub retry: RetryConfig,
}

impl Default for ScrobblerConfig {
    fn default() -> Self {
        Self {
            max_scrobbles_per_day: MAX_SCROBBLES_PER_DAY,
            window_hours: 24,
            batch_size: MAX_BATCH_SIZE,
            cache_dir: None,
            api: ApiConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ScrobblerConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from an optional TOML file, then apply `LASTFM_SCROBBLE__*`
    /// environment overrides. Missing keys keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ScrobbleError::Config(e.to_string()))?;
        config.validate()?;

        log::debug!(
            "Loaded config: cap {} per {}h, batch size {}",
            config.max_scrobbles_per_day,
            config.window_hours,
            config.batch_size
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ScrobbleError::Config(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.window_hours <= 0 || self.window_hours > MAX_WINDOW_HOURS {
            return Err(ScrobbleError::Config(format!(
                "window_hours must be between 1 and {MAX_WINDOW_HOURS}, got {}",
                self.window_hours
            )));
        }
        Ok(())
    }

    /// Set the daily cap
    pub fn with_max_scrobbles_per_day(mut self, max: usize) -> Self {
        self.max_scrobbles_per_day = max;
        self
    }

    /// Set the number of scrobbles per request, clamped to the Last.fm maximum
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Set API credentials
    pub fn with_api(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the directory the per-user caches live under
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.window_hours)
    }

    /// Cache file for `username`: `{root}/users/{username}/cache.db`, where
    /// the root is `cache_dir` or `<data_dir>/lastfm-scrobble`.
    ///
    /// Each account gets its own file so a flush never submits another
    /// user's scrobbles under this user's session.
    pub fn resolved_cache_path(&self, username: &str) -> Result<PathBuf> {
        let root = match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .ok_or_else(|| {
                    ScrobbleError::Config("Cannot determine XDG data directory".to_string())
                })?
                .join("lastfm-scrobble"),
        };
        Ok(root.join("users").join(username).join("cache.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ScrobblerConfig::default();
        assert_eq!(config.max_scrobbles_per_day, 2800);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.window(), chrono::Duration::hours(24));
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_size_is_clamped() {
        assert_eq!(ScrobblerConfig::new().with_batch_size(500).batch_size, 50);
        assert_eq!(ScrobblerConfig::new().with_batch_size(0).batch_size, 1);
    }

    #[test]
    fn test_load_from_file_keeps_missing_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "max_scrobbles_per_day = 10\n\n[api]\napi_key = \"key\"\napi_secret = \"secret\"\n\n[retry]\nmax_retries = 1"
        )
        .unwrap();

        let config = ScrobblerConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.max_scrobbles_per_day, 10);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.api.api_key, "key");
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.retry.max_retries, 1);
        assert!(config.retry.enabled);
    }

    #[test]
    fn test_window_hours_is_bounded() {
        let mut config = ScrobblerConfig::new();
        config.window_hours = 0;
        assert!(config.validate().is_err());

        config.window_hours = MAX_WINDOW_HOURS + 1;
        assert!(matches!(config.validate(), Err(ScrobbleError::Config(_))));

        config.window_hours = MAX_WINDOW_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_huge_window() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "window_hours = 9223372036854775807").unwrap();

        assert!(matches!(
            ScrobblerConfig::load(Some(file.path())),
            Err(ScrobbleError::Config(_))
        ));
    }

    #[test]
    fn test_cache_path_is_per_user() {
        let config = ScrobblerConfig::new().with_cache_dir("/tmp/scrobbles");

        let alice = config.resolved_cache_path("alice").unwrap();
        let bob = config.resolved_cache_path("bob").unwrap();

        assert_eq!(alice, PathBuf::from("/tmp/scrobbles/users/alice/cache.db"));
        assert_ne!(alice, bob);
    }

    #[test]
    fn test_load_rejects_invalid_batch_size() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "batch_size = 80").unwrap();

        assert!(matches!(
            ScrobblerConfig::load(Some(file.path())),
            Err(ScrobbleError::Config(_))
        ));
    }
}
