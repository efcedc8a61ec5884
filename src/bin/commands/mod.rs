pub mod cache;
pub mod scrobble;
pub mod session;
pub mod status;
pub mod utils;

use clap::Subcommand;
use lastfm_scrobble::{ScrobblerConfig, UserPersistence};

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to Last.fm and save the session
    ///
    /// Credentials are read from LASTFM_SCROBBLE_USERNAME and
    /// LASTFM_SCROBBLE_PASSWORD. The session key and the rolling scrobble
    /// window are saved in the data directory.
    ///
    /// Usage examples:
    /// # Log in with credentials from the environment
    /// lastfm-scrobble login
    Login,

    /// Forget a saved session
    ///
    /// Usage examples:
    /// # Remove the saved session for the current user
    /// lastfm-scrobble logout
    Logout,

    /// Submit a single scrobble
    ///
    /// The scrobble is checked against the daily cap before anything is sent.
    ///
    /// Usage examples:
    /// # Scrobble a track played just now
    /// lastfm-scrobble scrobble "Wilco" "Impossible Germany"
    ///
    /// # Scrobble with album and an explicit play time, caching on failure
    /// lastfm-scrobble scrobble "Wilco" "Impossible Germany" --album "Sky Blue Sky" --played-at 1700000000 --cache
    Scrobble {
        /// Artist name
        artist: String,

        /// Track name
        track: String,

        /// Album name (optional)
        #[arg(long)]
        album: Option<String>,

        /// Album artist name (optional)
        #[arg(long)]
        album_artist: Option<String>,

        /// Unix timestamp the track was played at (defaults to now)
        #[arg(long)]
        played_at: Option<i64>,

        /// Track length in seconds (optional)
        #[arg(long)]
        duration: Option<u64>,

        /// Store the scrobble in the local cache if submission fails
        #[arg(long)]
        cache: bool,
    },

    /// List scrobbles waiting in the local cache
    Cached,

    /// Send every cached scrobble to Last.fm
    ///
    /// Cached scrobbles were already counted against the daily cap when
    /// they were first submitted, so the cap is not checked again.
    Flush,

    /// Show the current user and how much of the daily cap is left
    Status,
}

/// Execute the appropriate command handler based on the parsed command
pub async fn execute_command(
    command: Commands,
    config: &ScrobblerConfig,
    persistence: &UserPersistence,
    username: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Login => session::handle_login(config, persistence).await,

        Commands::Logout => {
            let username = utils::resolve_username(persistence, username)?;
            session::handle_logout(persistence, &username)
        }

        Commands::Scrobble {
            artist,
            track,
            album,
            album_artist,
            played_at,
            duration,
            cache,
        } => {
            let scrobble = scrobble::create_scrobble_from_args(
                &artist,
                &track,
                album.as_deref(),
                album_artist.as_deref(),
                played_at,
                duration,
            )?;
            let gate = utils::load_gate(config, persistence, username)?;
            scrobble::handle_scrobble_command(&gate, persistence, scrobble, cache).await
        }

        Commands::Cached => {
            let gate = utils::load_gate(config, persistence, username)?;
            cache::handle_list_cached(&gate).await
        }

        Commands::Flush => {
            let gate = utils::load_gate(config, persistence, username)?;
            cache::handle_flush(&gate, persistence).await
        }

        Commands::Status => {
            let gate = utils::load_gate(config, persistence, username)?;
            status::handle_status(&gate).await
        }
    }
}
