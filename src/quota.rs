use crate::clock::{Clock, SystemClock};
use crate::config::ScrobblerConfig;
use crate::events::{ScrobblerEvent, ScrobblerEventReceiver, SharedEventBroadcaster};
use crate::scrobbler::{CachingScrobbler, Scrobbler};
use crate::{Result, Scrobble, ScrobbleError, ScrobbleResponse, User};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Single entry point for submitting scrobbles on behalf of a [`User`].
///
/// Every submission goes through the same sequence:
///
/// 1. the user's rolling window is refreshed (stale entries purged),
/// 2. the batch is refused with [`ScrobbleError::QuotaExceeded`] if it would
///    take the window above `max_scrobbles_per_day`, without touching the
///    network,
/// 3. the batch is handed to the caching or the direct scrobbler,
/// 4. on success the batch is recorded in the window, which is refreshed
///    again. A failed response still records the leading scrobbles it
///    reports as accepted or ignored.
///
/// The delegate's response is returned unchanged. Failures are not retried
/// here; resubmitting with `use_cache = true` is the caller's decision.
///
/// The user is locked for the whole sequence, so concurrent submissions for
/// the same user (including from other `QuotaScrobbler`s sharing the handle)
/// are serialized and cannot both pass the quota check on a stale count.
///
/// # Examples
///
/// ```rust,no_run
/// use lastfm_scrobble::{
///     ApiConfig, CacheScrobbler, FileCacheStore, LastFmScrobbler, QuotaScrobbler, Scrobble,
///     ScrobblerConfig,
/// };
///
/// # tokio_test::block_on(async {
/// let config = ScrobblerConfig::new().with_api(ApiConfig::new("api-key", "api-secret"));
/// let mut lastfm = LastFmScrobbler::new(Box::new(http_client::native::NativeClient::new()), &config);
/// let user = lastfm.authenticate("username", "password").await?;
///
/// let store = FileCacheStore::open(config.resolved_cache_path(&user.username)?)?;
/// let caching = CacheScrobbler::new(lastfm.clone(), store, &config);
/// let gate = QuotaScrobbler::new(user, lastfm, caching, config);
///
/// let scrobble = Scrobble::new("Wilco", "Impossible Germany", chrono::Utc::now())?;
/// let response = gate.scrobble(scrobble, false).await?;
/// println!("{:?}, {} left today", response.status, gate.remaining_quota().await);
/// # Ok::<(), lastfm_scrobble::ScrobbleError>(())
/// # });
/// ```
pub struct QuotaScrobbler<D, C> {
    user: Arc<Mutex<User>>,
    direct: D,
    caching: C,
    clock: Arc<dyn Clock>,
    config: ScrobblerConfig,
    broadcaster: Arc<SharedEventBroadcaster>,
}

impl<D: Scrobbler, C: CachingScrobbler> QuotaScrobbler<D, C> {
    pub fn new(user: User, direct: D, caching: C, config: ScrobblerConfig) -> Self {
        Self::with_shared_user(Arc::new(Mutex::new(user)), direct, caching, config)
    }

    /// Build a submitter around a user handle that other components also hold.
    pub fn with_shared_user(
        user: Arc<Mutex<User>>,
        direct: D,
        caching: C,
        config: ScrobblerConfig,
    ) -> Self {
        Self {
            user,
            direct,
            caching,
            clock: Arc::new(SystemClock),
            config,
            broadcaster: Arc::new(SharedEventBroadcaster::new()),
        }
    }

    /// Use a different time source for window purging and submission times.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
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

    pub fn user(&self) -> Arc<Mutex<User>> {
        Arc::clone(&self.user)
    }

    pub fn config(&self) -> &ScrobblerConfig {
        &self.config
    }

    pub fn direct(&self) -> &D {
        &self.direct
    }

    pub fn caching(&self) -> &C {
        &self.caching
    }

    /// True only when both the direct and the caching scrobbler are authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.direct.is_authenticated() && self.caching.is_authenticated()
    }

    /// Submit a single scrobble. See [`scrobble_batch`](Self::scrobble_batch).
    pub async fn scrobble(&self, scrobble: Scrobble, use_cache: bool) -> Result<ScrobbleResponse> {
        self.scrobble_batch(&[scrobble], use_cache).await
    }

    /// Submit a batch of scrobbles, enforcing the daily cap first.
    pub async fn scrobble_batch(
        &self,
        scrobbles: &[Scrobble],
        use_cache: bool,
    ) -> Result<ScrobbleResponse> {
        let mut user = self.user.lock().await;

        self.refresh_window(&mut user);
        let recent = user.recent_count();
        let max = self.config.max_scrobbles_per_day;

        if recent + scrobbles.len() > max {
            log::warn!(
                "Refusing {} scrobbles for {}: {recent} of {max} already submitted in the window",
                scrobbles.len(),
                user.username
            );
            self.broadcaster
                .broadcast_event(ScrobblerEvent::QuotaExceeded {
                    recent,
                    requested: scrobbles.len(),
                    max,
                });
            return Err(ScrobbleError::QuotaExceeded { recent, max });
        }

        log::debug!(
            "Submitting {} scrobbles for {} ({}), {recent} of {max} used",
            scrobbles.len(),
            user.username,
            if use_cache { "caching" } else { "direct" }
        );

        let response = if use_cache {
            self.caching.scrobble(scrobbles).await?
        } else {
            self.direct.scrobble(scrobbles).await?
        };

        self.broadcaster
            .broadcast_event(ScrobblerEvent::ScrobblesSubmitted {
                count: scrobbles.len(),
                used_cache: use_cache,
                status: response.status,
            });

        // A failure in a later request can follow requests Last.fm already
        // recorded; those still count against the cap.
        let recorded = if response.success() {
            scrobbles
        } else {
            &scrobbles[..response.processed(scrobbles.len())]
        };
        if !recorded.is_empty() {
            if !response.success() {
                log::info!(
                    "Submission ended with {:?}, counting the {} scrobbles Last.fm handled",
                    response.status,
                    recorded.len()
                );
            }
            user.add_scrobbles(recorded, self.clock.now());
            self.refresh_window(&mut user);
        }

        Ok(response)
    }

    /// Flush the caching scrobbler's cache.
    ///
    /// The daily cap is not checked again for cached scrobbles.
    pub async fn send_cached(&self) -> Result<ScrobbleResponse> {
        self.caching.send_cached().await
    }

    /// Scrobbles currently waiting in the cache.
    pub async fn get_cached(&self) -> Result<Vec<Scrobble>> {
        self.caching.get_cached().await
    }

    /// Scrobbles that can still be submitted in the current window.
    pub async fn remaining_quota(&self) -> usize {
        let mut user = self.user.lock().await;
        self.refresh_window(&mut user);
        self.config
            .max_scrobbles_per_day
            .saturating_sub(user.recent_count())
    }

    fn refresh_window(&self, user: &mut User) {
        user.refresh_recent_scrobbles(self.clock.now(), self.config.window());
    }
}
