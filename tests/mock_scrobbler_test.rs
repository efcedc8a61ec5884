#[cfg(feature = "mock")]
mod mock_tests {
    use chrono::Utc;
    use lastfm_scrobble::{
        MockCachingScrobbler, MockScrobbler, QuotaScrobbler, Result, Scrobble, ScrobbleError,
        ScrobbleResponse, ScrobbleStatus, ScrobblerConfig, User,
    };

    fn batch(n: usize) -> Vec<Scrobble> {
        (0..n)
            .map(|i| Scrobble::new("Artist", format!("Track {i}"), Utc::now()).unwrap())
            .collect()
    }

    fn user() -> User {
        User::new("testuser".to_string(), "session".to_string(), true)
    }

    #[tokio::test]
    async fn test_mock_direct_submission() -> Result<()> {
        let mut direct = MockScrobbler::new();
        direct
            .expect_scrobble()
            .withf(|scrobbles| scrobbles.len() == 2)
            .times(1)
            .returning(|scrobbles| Ok(ScrobbleResponse::successful(scrobbles.len(), Vec::new())));

        let mut caching = MockCachingScrobbler::new();
        caching.expect_scrobble().never();

        let gate = QuotaScrobbler::new(user(), direct, caching, ScrobblerConfig::new());
        let response = gate.scrobble_batch(&batch(2), false).await?;

        assert_eq!(response.accepted, 2);
        assert_eq!(gate.user().lock().await.recent_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_mock_refusal_never_reaches_submitters() {
        let mut direct = MockScrobbler::new();
        direct.expect_scrobble().never();
        let mut caching = MockCachingScrobbler::new();
        caching.expect_scrobble().never();

        let config = ScrobblerConfig::new().with_max_scrobbles_per_day(1);
        let gate = QuotaScrobbler::new(user(), direct, caching, config);

        let result = gate.scrobble_batch(&batch(2), true).await;
        assert!(matches!(
            result,
            Err(ScrobbleError::QuotaExceeded { recent: 0, max: 1 })
        ));
    }

    #[tokio::test]
    async fn test_mock_authentication_and_cache_calls() -> Result<()> {
        let mut direct = MockScrobbler::new();
        direct.expect_is_authenticated().returning(|| true);

        let mut caching = MockCachingScrobbler::new();
        caching.expect_is_authenticated().returning(|| false);
        caching
            .expect_get_cached()
            .times(1)
            .returning(|| Ok(Vec::new()));
        caching
            .expect_send_cached()
            .times(1)
            .returning(|| Ok(ScrobbleResponse::failed(ScrobbleStatus::BadAuth, "no session")));

        let gate = QuotaScrobbler::new(user(), direct, caching, ScrobblerConfig::new());

        assert!(!gate.is_authenticated());
        assert!(gate.get_cached().await?.is_empty());
        assert_eq!(gate.send_cached().await?.status, ScrobbleStatus::BadAuth);
        Ok(())
    }
}
