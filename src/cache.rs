use crate::config::ScrobblerConfig;
use crate::events::{ScrobblerEvent, ScrobblerEventReceiver, SharedEventBroadcaster};
use crate::response::{ScrobbleResponse, ScrobbleStatus};
use crate::scrobbler::{CachingScrobbler, Scrobbler};
use crate::{Result, Scrobble, ScrobbleError};
use async_trait::async_trait;
use pickledb::{PickleDb, PickleDbDumpPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

const CACHE_KEY: &str = "cached_scrobbles";

/// Local storage for scrobbles that could not be submitted.
#[async_trait(?Send)]
pub trait ScrobbleCacheStore {
    /// Add scrobbles to the end of the cache
    async fn append(&self, scrobbles: &[Scrobble]) -> Result<()>;

    /// Read the whole cache, oldest first
    async fn load(&self) -> Result<Vec<Scrobble>>;

    /// Overwrite the cache
    async fn replace(&self, scrobbles: Vec<Scrobble>) -> Result<()>;

    async fn clear(&self) -> Result<()> {
        self.replace(Vec::new()).await
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }
}

/// File-based cache using pickledb
pub struct FileCacheStore {
    db: Mutex<PickleDb>,
    path: PathBuf,
}

/// Read the cached list, failing if the stored entry cannot be decoded.
fn read_cached(db: &PickleDb) -> Result<Vec<Scrobble>> {
    if !db.exists(CACHE_KEY) {
        return Ok(Vec::new());
    }
    db.get(CACHE_KEY).ok_or_else(|| {
        ScrobbleError::Cache(format!("Cannot decode the `{CACHE_KEY}` entry"))
    })
}

impl FileCacheStore {
    /// Open the cache at `path`, creating it (and its directory) if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let db = if path.exists() {
            PickleDb::load_json(path, PickleDbDumpPolicy::AutoDump).map_err(|e| {
                ScrobbleError::Cache(format!("Failed to load {}: {e}", path.display()))
            })?
        } else {
            PickleDb::new_json(path, PickleDbDumpPolicy::AutoDump)
        };

        log::debug!("Scrobble cache opened at {}", path.display());
        Ok(Self {
            db: Mutex::new(db),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait(?Send)]
impl ScrobbleCacheStore for FileCacheStore {
    async fn append(&self, scrobbles: &[Scrobble]) -> Result<()> {
        let mut db = self.db.lock().await;
        let mut cached = read_cached(&db)?;
        cached.extend_from_slice(scrobbles);
        db.set(CACHE_KEY, &cached)
            .map_err(|e| ScrobbleError::Cache(e.to_string()))
    }

    async fn load(&self) -> Result<Vec<Scrobble>> {
        read_cached(&*self.db.lock().await)
    }

    async fn replace(&self, scrobbles: Vec<Scrobble>) -> Result<()> {
        let mut db = self.db.lock().await;
        if scrobbles.is_empty() {
            db.rem(CACHE_KEY)
                .map(|_| ())
                .map_err(|e| ScrobbleError::Cache(e.to_string()))
        } else {
            db.set(CACHE_KEY, &scrobbles)
                .map_err(|e| ScrobbleError::Cache(e.to_string()))
        }
    }
}

/// In-memory cache, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    scrobbles: RwLock<Vec<Scrobble>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scrobbles(scrobbles: Vec<Scrobble>) -> Self {
        Self {
            scrobbles: RwLock::new(scrobbles),
        }
    }
}

#[async_trait(?Send)]
impl ScrobbleCacheStore for MemoryCacheStore {
    async fn append(&self, scrobbles: &[Scrobble]) -> Result<()> {
        self.scrobbles.write().await.extend_from_slice(scrobbles);
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Scrobble>> {
        Ok(self.scrobbles.read().await.clone())
    }

    async fn replace(&self, scrobbles: Vec<Scrobble>) -> Result<()> {
        *self.scrobbles.write().await = scrobbles;
        Ok(())
    }
}

/// Wraps a [`Scrobbler`] so failed submissions land in a cache store.
///
/// A failed batch is cached starting after whatever prefix the inner
/// scrobbler reports as processed (accepted plus ignored), so scrobbles
/// Last.fm already recorded are not sent twice on the next flush.
pub struct CacheScrobbler<S, St> {
    inner: S,
    store: St,
    batch_size: usize,
    broadcaster: Arc<SharedEventBroadcaster>,
}

impl<S: Scrobbler, St: ScrobbleCacheStore> CacheScrobbler<S, St> {
    pub fn new(inner: S, store: St, config: &ScrobblerConfig) -> Self {
        Self {
            inner,
            store,
            batch_size: config.batch_size.max(1),
            broadcaster: Arc::new(SharedEventBroadcaster::new()),
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: SharedEventBroadcaster) -> Self {
        self.broadcaster = Arc::new(broadcaster);
        self
    }

    pub fn subscribe(&self) -> ScrobblerEventReceiver {
        self.broadcaster.subscribe()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn store(&self) -> &St {
        &self.store
    }
}

#[async_trait(?Send)]
impl<S: Scrobbler, St: ScrobbleCacheStore> CachingScrobbler for CacheScrobbler<S, St> {
    fn is_authenticated(&self) -> bool {
        self.inner.is_authenticated()
    }

    async fn scrobble(&self, scrobbles: &[Scrobble]) -> Result<ScrobbleResponse> {
        let response = self.inner.scrobble(scrobbles).await?;
        if response.success() || scrobbles.is_empty() {
            return Ok(response);
        }

        let pending = &scrobbles[response.processed(scrobbles.len())..];
        self.store.append(pending).await?;
        log::info!(
            "Submission failed ({:?}), cached {} scrobbles for later",
            response.status,
            pending.len()
        );
        self.broadcaster
            .broadcast_event(ScrobblerEvent::ScrobblesCached {
                count: pending.len(),
            });

        Ok(ScrobbleResponse {
            status: ScrobbleStatus::Cached,
            ..response
        })
    }

    async fn get_cached(&self) -> Result<Vec<Scrobble>> {
        self.store.load().await
    }

    async fn send_cached(&self) -> Result<ScrobbleResponse> {
        let cached = self.store.load().await?;
        if cached.is_empty() {
            log::debug!("Scrobble cache is empty, nothing to send");
            return Ok(ScrobbleResponse::successful(0, Vec::new()));
        }

        log::info!("Sending {} cached scrobbles", cached.len());
        let mut response = ScrobbleResponse::successful(0, Vec::new());
        let mut offset = 0;

        while offset < cached.len() {
            let end = (offset + self.batch_size).min(cached.len());
            let chunk = &cached[offset..end];

            let chunk_response = match self.inner.scrobble(chunk).await {
                Ok(chunk_response) => chunk_response,
                Err(e) => {
                    self.store.replace(cached[offset..].to_vec()).await?;
                    return Err(e);
                }
            };

            let chunk_ok = chunk_response.success();
            offset += if chunk_ok {
                chunk.len()
            } else {
                chunk_response.processed(chunk.len())
            };
            response.merge(chunk_response);
            if !chunk_ok {
                break;
            }
        }

        let remaining = cached[offset..].to_vec();
        let remaining_count = remaining.len();
        self.store.replace(remaining).await?;

        if remaining_count > 0 {
            log::warn!(
                "Cache flush stopped with {:?}: {} sent, {} still cached",
                response.status,
                offset,
                remaining_count
            );
        }
        self.broadcaster
            .broadcast_event(ScrobblerEvent::CacheFlushed {
                submitted: offset,
                remaining: remaining_count,
                status: response.status,
            });

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn scrobbles(n: usize) -> Vec<Scrobble> {
        let played_at = Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap();
        (0..n)
            .map(|i| Scrobble::new("Artist", format!("Track {i}"), played_at).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_memory_store_append_and_clear() {
        let store = MemoryCacheStore::new();
        store.append(&scrobbles(2)).await.unwrap();
        store.append(&scrobbles(1)).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 3);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");

        {
            let store = FileCacheStore::open(&path).unwrap();
            store.append(&scrobbles(3)).await.unwrap();
        }

        let reopened = FileCacheStore::open(&path).unwrap();
        assert_eq!(reopened.load().await.unwrap(), scrobbles(3));

        reopened.clear().await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_reports_undecodable_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let mut db = PickleDb::new_json(&path, PickleDbDumpPolicy::AutoDump);
            db.set(CACHE_KEY, &"not a scrobble list").unwrap();
        }

        let store = FileCacheStore::open(&path).unwrap();

        assert!(matches!(store.load().await, Err(ScrobbleError::Cache(_))));
        assert!(matches!(
            store.append(&scrobbles(1)).await,
            Err(ScrobbleError::Cache(_))
        ));

        // The unreadable entry is left alone
        let db = PickleDb::load_json(&path, PickleDbDumpPolicy::NeverDump).unwrap();
        assert_eq!(
            db.get::<String>(CACHE_KEY).as_deref(),
            Some("not a scrobble list")
        );
    }
}
