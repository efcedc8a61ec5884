#![allow(dead_code)]
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lastfm_scrobble::{
    CachingScrobbler, Result, Scrobble, ScrobbleResponse, ScrobbleStatus, Scrobbler,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// `n` distinct scrobbles played before [`start_time`].
pub fn scrobbles(n: usize) -> Vec<Scrobble> {
    (0..n)
        .map(|i| {
            Scrobble::new(
                "Test Artist",
                format!("Track {i}"),
                start_time() - chrono::Duration::minutes(5 * (n - i) as i64),
            )
            .unwrap()
        })
        .collect()
}

/// Scrobbler that records every batch and answers from a script.
///
/// When the script runs out, every batch is accepted in full.
#[derive(Clone, Default)]
pub struct RecordingScrobbler {
    calls: Arc<AtomicUsize>,
    batches: Arc<Mutex<Vec<Vec<Scrobble>>>>,
    script: Arc<Mutex<VecDeque<ScrobbleResponse>>>,
    authenticated: bool,
}

impl RecordingScrobbler {
    pub fn new() -> Self {
        Self {
            authenticated: true,
            ..Default::default()
        }
    }

    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// Queue the response for the next call.
    pub fn then_respond(self, response: ScrobbleResponse) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn then_fail(self, status: ScrobbleStatus) -> Self {
        self.then_respond(ScrobbleResponse::failed(status, "scripted failure"))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<Scrobble>> {
        self.batches.lock().unwrap().clone()
    }

    async fn record(&self, scrobbles: &[Scrobble]) -> ScrobbleResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(scrobbles.to_vec());
        // Let other futures on the same task run while the "request" is in flight
        tokio::task::yield_now().await;

        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| ScrobbleResponse::successful(scrobbles.len(), Vec::new()))
    }
}

#[async_trait(?Send)]
impl Scrobbler for RecordingScrobbler {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn scrobble(&self, scrobbles: &[Scrobble]) -> Result<ScrobbleResponse> {
        Ok(self.record(scrobbles).await)
    }
}

/// Caching scrobbler fake: counts calls to each operation and keeps its
/// "cache" in memory.
#[derive(Clone, Default)]
pub struct RecordingCache {
    pub inner: RecordingScrobbler,
    pub cached: Arc<Mutex<Vec<Scrobble>>>,
    pub get_cached_calls: Arc<AtomicUsize>,
    pub send_cached_calls: Arc<AtomicUsize>,
}

impl RecordingCache {
    pub fn new(inner: RecordingScrobbler) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn with_cached(self, scrobbles: Vec<Scrobble>) -> Self {
        *self.cached.lock().unwrap() = scrobbles;
        self
    }

    pub fn get_cached_calls(&self) -> usize {
        self.get_cached_calls.load(Ordering::SeqCst)
    }

    pub fn send_cached_calls(&self) -> usize {
        self.send_cached_calls.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl CachingScrobbler for RecordingCache {
    fn is_authenticated(&self) -> bool {
        self.inner.is_authenticated()
    }

    async fn scrobble(&self, scrobbles: &[Scrobble]) -> Result<ScrobbleResponse> {
        let response = self.inner.record(scrobbles).await;
        if response.success() {
            return Ok(response);
        }
        self.cached.lock().unwrap().extend_from_slice(scrobbles);
        Ok(ScrobbleResponse {
            status: ScrobbleStatus::Cached,
            ..response
        })
    }

    async fn get_cached(&self) -> Result<Vec<Scrobble>> {
        self.get_cached_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.cached.lock().unwrap().clone())
    }

    async fn send_cached(&self) -> Result<ScrobbleResponse> {
        self.send_cached_calls.fetch_add(1, Ordering::SeqCst);
        let cached = std::mem::take(&mut *self.cached.lock().unwrap());
        Ok(ScrobbleResponse::successful(cached.len(), Vec::new()))
    }
}
