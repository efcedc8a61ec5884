use crate::Scrobble;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default number of scrobbles Last.fm accepts per account in 24 hours.
pub const MAX_SCROBBLES_PER_DAY: usize = 2800;

/// Length of the rolling window the daily cap applies to.
pub fn scrobble_window() -> Duration {
    Duration::hours(24)
}

/// A scrobble together with the time it was accepted by Last.fm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentScrobble {
    pub scrobble: Scrobble,
    pub submitted_at: DateTime<Utc>,
}

/// Change notifications emitted by a [`User`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserChange {
    /// A batch was recorded as submitted
    ScrobblesAdded {
        /// Scrobbles in the batch
        added: usize,
        /// Scrobbles in the window afterwards
        recent: usize,
    },
    /// Stale entries were purged from the window
    WindowRefreshed {
        /// Entries removed
        purged: usize,
        /// Entries left
        recent: usize,
    },
}

pub type UserChangeReceiver = broadcast::Receiver<UserChange>;

fn change_channel() -> broadcast::Sender<UserChange> {
    broadcast::channel(100).0
}

/// The Last.fm account scrobbles are submitted for.
///
/// Besides the session credentials, a user carries the rolling window of
/// scrobbles submitted in the last 24 hours, which is what the daily cap is
/// checked against. The window is only changed through
/// [`add_scrobbles`](Self::add_scrobbles) and
/// [`refresh_recent_scrobbles`](Self::refresh_recent_scrobbles).
///
/// The whole user, window included, serializes to JSON so it survives between
/// sessions (see [`UserPersistence`](crate::UserPersistence)).
#[derive(Debug, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// Last.fm session key
    pub session_key: String,
    pub is_subscriber: bool,
    #[serde(default)]
    recent_scrobbles: Vec<RecentScrobble>,
    #[serde(skip, default = "change_channel")]
    changes: broadcast::Sender<UserChange>,
}

impl User {
    pub fn new(username: String, session_key: String, is_subscriber: bool) -> Self {
        Self {
            username,
            session_key,
            is_subscriber,
            recent_scrobbles: Vec::new(),
            changes: change_channel(),
        }
    }

    /// Check if the stored credentials look usable.
    ///
    /// This doesn't guarantee the session is still valid on Last.fm.
    pub fn is_valid(&self) -> bool {
        !self.username.is_empty() && !self.session_key.is_empty()
    }

    pub fn recent_scrobbles(&self) -> &[RecentScrobble] {
        &self.recent_scrobbles
    }

    /// Number of scrobbles in the window as of the last refresh.
    pub fn recent_count(&self) -> usize {
        self.recent_scrobbles.len()
    }

    pub fn subscribe_changes(&self) -> UserChangeReceiver {
        self.changes.subscribe()
    }

    /// Record a submitted batch. Sends one notification per call.
    pub fn add_scrobbles(&mut self, scrobbles: &[Scrobble], submitted_at: DateTime<Utc>) {
        self.recent_scrobbles
            .extend(scrobbles.iter().cloned().map(|scrobble| RecentScrobble {
                scrobble,
                submitted_at,
            }));

        let _ = self.changes.send(UserChange::ScrobblesAdded {
            added: scrobbles.len(),
            recent: self.recent_scrobbles.len(),
        });
    }

    /// Drop every entry submitted before `now - window` and return how many
    /// were removed. Safe to call any number of times.
    pub fn refresh_recent_scrobbles(&mut self, now: DateTime<Utc>, window: Duration) -> usize {
        let cutoff = now - window;
        let before = self.recent_scrobbles.len();
        self.recent_scrobbles.retain(|r| r.submitted_at >= cutoff);
        let purged = before - self.recent_scrobbles.len();

        if purged > 0 {
            log::debug!(
                "Purged {purged} scrobbles older than {cutoff} for {}",
                self.username
            );
            let _ = self.changes.send(UserChange::WindowRefreshed {
                purged,
                recent: self.recent_scrobbles.len(),
            });
        }

        purged
    }

    /// Serialize user to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize user from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
