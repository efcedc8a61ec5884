use super::utils::{format_timestamp, save_gate_user, Gate};
use lastfm_scrobble::UserPersistence;

/// Print the scrobbles waiting in the local cache
pub async fn handle_list_cached(gate: &Gate) -> Result<(), Box<dyn std::error::Error>> {
    let cached = gate.get_cached().await?;

    if cached.is_empty() {
        println!("📭 No cached scrobbles");
        return Ok(());
    }

    println!("💾 {} cached scrobbles:", cached.len());
    for (index, scrobble) in cached.iter().enumerate() {
        println!(
            "  {index:>3}. {scrobble} ({})",
            format_timestamp(scrobble.played_at())
        );
    }
    Ok(())
}

/// Send the cached scrobbles to Last.fm
pub async fn handle_flush(
    gate: &Gate,
    persistence: &UserPersistence,
) -> Result<(), Box<dyn std::error::Error>> {
    let before = gate.get_cached().await?.len();
    if before == 0 {
        println!("📭 No cached scrobbles to send");
        return Ok(());
    }

    println!("📤 Sending {before} cached scrobbles...");
    let response = gate.send_cached().await?;
    save_gate_user(persistence, gate).await?;

    let remaining = gate.get_cached().await?.len();
    if response.success() {
        println!(
            "✅ Flushed cache: {} accepted, {} ignored",
            response.accepted,
            response.ignored.len()
        );
    } else {
        println!(
            "⚠️  Flush stopped ({:?}): {}",
            response.status,
            response.message.as_deref().unwrap_or("no details")
        );
        println!("   {remaining} scrobbles still cached");
    }
    Ok(())
}
