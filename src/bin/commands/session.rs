use super::utils::get_credentials;
use lastfm_scrobble::{LastFmScrobbler, ScrobblerConfig, UserPersistence};

/// Log in with the credentials from the environment and save the session
pub async fn handle_login(
    config: &ScrobblerConfig,
    persistence: &UserPersistence,
) -> Result<(), Box<dyn std::error::Error>> {
    let (username, password) = get_credentials()?;

    println!("🔐 Logging in as {username}...");
    let http_client = http_client::native::NativeClient::new();
    let mut lastfm = LastFmScrobbler::new(Box::new(http_client), config);
    let mut user = lastfm.authenticate(&username, &password).await?;

    // Keep the scrobble window from an earlier session, the cap is per account
    if let Ok(previous) = persistence.load_user(&user.username) {
        for recent in previous.recent_scrobbles() {
            user.add_scrobbles(std::slice::from_ref(&recent.scrobble), recent.submitted_at);
        }
    }

    persistence.save_user(&user)?;
    println!(
        "✅ Logged in as {}{}",
        user.username,
        if user.is_subscriber { " (subscriber)" } else { "" }
    );
    println!(
        "   Session saved to {}",
        persistence.user_path(&user.username).display()
    );
    Ok(())
}

/// Remove a saved session
pub fn handle_logout(
    persistence: &UserPersistence,
    username: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !persistence.user_exists(username) {
        println!("ℹ️  No saved session for {username}");
        return Ok(());
    }

    persistence.remove_user(username)?;
    println!("👋 Logged out {username}");
    Ok(())
}
