mod commands;

use clap::Parser;
use commands::{execute_command, Commands};
use lastfm_scrobble::{ScrobblerConfig, UserPersistence};
use std::path::PathBuf;

/// Quota-aware Last.fm scrobbler
#[derive(Parser)]
#[command(
    name = "lastfm-scrobble",
    about = "Submit scrobbles to Last.fm without exceeding the daily limit",
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Last.fm user to act for (defaults to the only saved user)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Show detailed debug information
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match ScrobblerConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {e}");
            eprintln!();
            eprintln!("Set your API credentials in a config file or the environment:");
            eprintln!("  LASTFM_SCROBBLE__API__API_KEY=your_api_key");
            eprintln!("  LASTFM_SCROBBLE__API__API_SECRET=your_api_secret");
            std::process::exit(1);
        }
    };

    let persistence = match UserPersistence::new() {
        Ok(persistence) => persistence,
        Err(e) => {
            eprintln!("❌ Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = execute_command(args.command, &config, &persistence, args.user).await {
        eprintln!("❌ Command failed: {e}");
        std::process::exit(1);
    }

    Ok(())
}
