use super::utils::{save_gate_user, Gate};
use lastfm_scrobble::{Scrobble, ScrobbleError, ScrobbleStatus, UserPersistence};

/// Build a scrobble from command line arguments
pub fn create_scrobble_from_args(
    artist: &str,
    track: &str,
    album: Option<&str>,
    album_artist: Option<&str>,
    played_at: Option<i64>,
    duration: Option<u64>,
) -> Result<Scrobble, ScrobbleError> {
    let played_at = match played_at {
        Some(ts) => chrono::DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| ScrobbleError::Validation(format!("invalid timestamp: {ts}")))?,
        None => chrono::Utc::now(),
    };

    let mut scrobble = Scrobble::new(artist, track, played_at)?;
    if let Some(album) = album {
        scrobble = scrobble.with_album(album);
    }
    if let Some(album_artist) = album_artist {
        scrobble = scrobble.with_album_artist(album_artist);
    }
    if let Some(seconds) = duration {
        scrobble = scrobble.with_duration(std::time::Duration::from_secs(seconds));
    }
    Ok(scrobble)
}

/// Submit one scrobble through the quota gate and save the updated window
pub async fn handle_scrobble_command(
    gate: &Gate,
    persistence: &UserPersistence,
    scrobble: Scrobble,
    use_cache: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🎵 Scrobbling {scrobble}");

    let response = match gate.scrobble(scrobble, use_cache).await {
        Ok(response) => response,
        Err(ScrobbleError::QuotaExceeded { recent, max }) => {
            println!("⛔ Daily limit reached: {recent} of {max} scrobbles in the last 24 hours");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    save_gate_user(persistence, gate).await?;

    match response.status {
        ScrobbleStatus::Successful => {
            println!("✅ Accepted: {}", response.accepted);
            for ignored in &response.ignored {
                println!(
                    "   ⚠️  Ignored {} - {}: {} (code {})",
                    ignored.artist, ignored.track, ignored.message, ignored.code
                );
            }
        }
        ScrobbleStatus::Cached => {
            println!(
                "💾 Submission failed, scrobble cached for later: {}",
                response.message.as_deref().unwrap_or("no details")
            );
        }
        status => {
            println!(
                "❌ Submission failed ({status:?}): {}",
                response.message.as_deref().unwrap_or("no details")
            );
        }
    }

    println!("   {} scrobbles left today", gate.remaining_quota().await);
    Ok(())
}
