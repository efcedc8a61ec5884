//! # Submission Events
//!
//! A broadcast channel of events describing what the submitters are doing,
//! so a front end can refresh its view without being wired into the
//! submission logic.

use crate::response::ScrobbleStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

/// Request information for HTTP events
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestInfo {
    /// The HTTP method (GET, POST, etc.)
    pub method: String,
    /// The Last.fm API method being called (e.g. `track.scrobble`)
    pub api_method: String,
    /// Number of scrobbles carried by the request
    pub scrobbles: usize,
}

impl RequestInfo {
    pub fn new(method: &str, api_method: &str, scrobbles: usize) -> Self {
        Self {
            method: method.to_string(),
            api_method: api_method.to_string(),
            scrobbles,
        }
    }

    /// Get a short description of the request for logging
    pub fn short_description(&self) -> String {
        if self.scrobbles > 0 {
            format!(
                "{} {} ({} scrobbles)",
                self.method, self.api_method, self.scrobbles
            )
        } else {
            format!("{} {}", self.method, self.api_method)
        }
    }
}

/// Events emitted while scrobbles are checked, submitted and cached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScrobblerEvent {
    /// Request started
    RequestStarted {
        /// Request details
        request: RequestInfo,
    },
    /// Request completed
    RequestCompleted {
        /// Request details
        request: RequestInfo,
        /// HTTP status code
        status_code: u16,
        /// Duration of the request in milliseconds
        duration_ms: u64,
    },
    /// Last.fm asked us to slow down
    RateLimited {
        /// Duration to wait in seconds
        delay_seconds: u64,
        /// Request that triggered the rate limit
        request: RequestInfo,
    },
    /// A batch was refused because it would exceed the daily cap
    QuotaExceeded {
        /// Scrobbles in the trailing window
        recent: usize,
        /// Size of the refused batch
        requested: usize,
        /// Daily cap
        max: usize,
    },
    /// A batch was handed to a submitter
    ScrobblesSubmitted {
        /// Size of the batch
        count: usize,
        /// Whether the caching submitter was used
        used_cache: bool,
        /// Status the submitter reported
        status: ScrobbleStatus,
    },
    /// A failed batch was stored in the local cache
    ScrobblesCached {
        /// Size of the batch
        count: usize,
    },
    /// A cache flush finished
    CacheFlushed {
        /// Scrobbles submitted from the cache
        submitted: usize,
        /// Scrobbles still cached afterwards
        remaining: usize,
        /// Status of the flush
        status: ScrobbleStatus,
    },
}

/// Type alias for the broadcast receiver
pub type ScrobblerEventReceiver = broadcast::Receiver<ScrobblerEvent>;

/// Type alias for the watch receiver
pub type ScrobblerEventWatcher = watch::Receiver<Option<ScrobblerEvent>>;

/// Shared event broadcasting state that can be handed to several submitters
#[derive(Clone)]
pub struct SharedEventBroadcaster {
    event_tx: broadcast::Sender<ScrobblerEvent>,
    last_event_tx: watch::Sender<Option<ScrobblerEvent>>,
}

impl SharedEventBroadcaster {
    /// Create a new shared event broadcaster
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let (last_event_tx, _) = watch::channel(None);

        Self {
            event_tx,
            last_event_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: ScrobblerEvent) {
        let _ = self.event_tx.send(event.clone());
        let _ = self.last_event_tx.send_replace(Some(event));
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> ScrobblerEventReceiver {
        self.event_tx.subscribe()
    }

    /// Watch the most recent event
    pub fn watch(&self) -> ScrobblerEventWatcher {
        self.last_event_tx.subscribe()
    }

    /// Get the latest event
    pub fn latest_event(&self) -> Option<ScrobblerEvent> {
        self.last_event_tx.borrow().clone()
    }
}

impl Default for SharedEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedEventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEventBroadcaster")
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}
