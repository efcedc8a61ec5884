use lastfm_scrobble::{
    CacheScrobbler, FileCacheStore, LastFmScrobbler, QuotaScrobbler, ScrobbleError,
    ScrobblerConfig, User, UserPersistence,
};
use std::env;

pub type Gate = QuotaScrobbler<LastFmScrobbler, CacheScrobbler<LastFmScrobbler, FileCacheStore>>;

/// Get Last.fm credentials from environment variables
pub fn get_credentials() -> Result<(String, String), String> {
    let username = env::var("LASTFM_SCROBBLE_USERNAME")
        .map_err(|_| "LASTFM_SCROBBLE_USERNAME environment variable not set")?;
    let password = env::var("LASTFM_SCROBBLE_PASSWORD")
        .map_err(|_| "LASTFM_SCROBBLE_PASSWORD environment variable not set")?;
    Ok((username, password))
}

/// Pick the user to act for: the one named on the command line, the one in
/// `LASTFM_SCROBBLE_USERNAME`, or the only saved user.
pub fn resolve_username(
    persistence: &UserPersistence,
    requested: Option<String>,
) -> Result<String, ScrobbleError> {
    if let Some(username) = requested.or_else(|| env::var("LASTFM_SCROBBLE_USERNAME").ok()) {
        return Ok(username);
    }

    let mut saved = persistence.list_saved_users()?;
    match saved.len() {
        1 => Ok(saved.remove(0)),
        0 => Err(ScrobbleError::NotAuthenticated(
            "no saved user, run `lastfm-scrobble login` first".to_string(),
        )),
        _ => Err(ScrobbleError::NotAuthenticated(format!(
            "several saved users ({}), pass --user",
            saved.join(", ")
        ))),
    }
}

/// Wire a saved user to a direct and a caching Last.fm scrobbler.
pub fn build_gate(config: &ScrobblerConfig, user: User) -> Result<Gate, ScrobbleError> {
    let http_client = http_client::native::NativeClient::new();
    let lastfm = LastFmScrobbler::from_user(Box::new(http_client), config, &user);

    let store = FileCacheStore::open(config.resolved_cache_path(&user.username)?)?;
    let caching = CacheScrobbler::new(lastfm.clone(), store, config);

    Ok(QuotaScrobbler::new(user, lastfm, caching, config.clone()))
}

/// Load the saved user and build a gate for it.
pub fn load_gate(
    config: &ScrobblerConfig,
    persistence: &UserPersistence,
    requested: Option<String>,
) -> Result<Gate, ScrobbleError> {
    let username = resolve_username(persistence, requested)?;
    let user = persistence.load_user(&username)?;
    log::debug!(
        "Loaded {} with {} scrobbles in the current window",
        user.username,
        user.recent_count()
    );
    build_gate(config, user)
}

/// Format a timestamp for display
pub fn format_timestamp(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    timestamp
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Persist the user held by the gate, so the scrobble window survives restarts.
pub async fn save_gate_user(
    persistence: &UserPersistence,
    gate: &Gate,
) -> Result<(), ScrobbleError> {
    let user = gate.user();
    let user = user.lock().await;
    persistence.save_user(&user)
}
