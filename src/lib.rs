//! # lastfm-scrobble
//!
//! Quota-enforcing, cache-backed scrobble submission for Last.fm.
//!
//! [`QuotaScrobbler`] is the single entry point: it checks every batch against
//! the user's rolling 24-hour scrobble count before handing it to either a
//! direct [`Scrobbler`] (such as [`LastFmScrobbler`]) or a
//! [`CachingScrobbler`] (such as [`CacheScrobbler`]) that keeps failed
//! batches for a later flush.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod quota;
pub mod response;
pub mod retry;
pub mod scrobble;
pub mod scrobbler;
pub mod user;
pub mod user_persistence;

pub use api::LastFmScrobbler;
pub use cache::{CacheScrobbler, FileCacheStore, MemoryCacheStore, ScrobbleCacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{ApiConfig, RetryConfig, ScrobblerConfig};
pub use error::ScrobbleError;
pub use events::{RequestInfo, ScrobblerEvent, ScrobblerEventReceiver, SharedEventBroadcaster};
pub use quota::QuotaScrobbler;
pub use response::{IgnoredScrobble, ScrobbleResponse, ScrobbleStatus};
pub use scrobble::Scrobble;
pub use scrobbler::{CachingScrobbler, Scrobbler};
pub use user::{RecentScrobble, User, UserChange, MAX_SCROBBLES_PER_DAY};
pub use user_persistence::UserPersistence;

#[cfg(feature = "mock")]
pub use scrobbler::{MockCachingScrobbler, MockScrobbler};

pub type Result<T> = std::result::Result<T, ScrobbleError>;
