use super::utils::{format_timestamp, Gate};

/// Show the user, the state of the scrobble window and the cache
pub async fn handle_status(gate: &Gate) -> Result<(), Box<dyn std::error::Error>> {
    let remaining = gate.remaining_quota().await;
    let max = gate.config().max_scrobbles_per_day;
    let cached = gate.get_cached().await?.len();

    let user = gate.user();
    let user = user.lock().await;

    println!("👤 {}", user.username);
    println!(
        "   Authenticated: {}",
        if gate.is_authenticated() { "yes" } else { "no" }
    );
    println!(
        "   Scrobbles in the last {}h: {} of {max} ({remaining} left)",
        gate.config().window_hours,
        user.recent_count()
    );
    if let Some(oldest) = user.recent_scrobbles().iter().map(|r| r.submitted_at).min() {
        println!(
            "   Oldest counted submission: {} (leaves the window {})",
            format_timestamp(oldest),
            format_timestamp(oldest + gate.config().window())
        );
    }
    println!("   Cached scrobbles: {cached}");
    Ok(())
}
