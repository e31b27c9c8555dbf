//! Discord Archiver - main entry point
//!
//! Reads `DISCORD_TOKEN`, `CHANNEL_ID` and optionally `MESSAGE_COUNT` from the
//! environment (or `.env`), archives the channel into `logs/` and exits.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use discord_archiver::commands;
use discord_archiver::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Loads .env first, so RUST_LOG set there is honored.
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let result = match config {
        Ok(config) => commands::archive_run(&config).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
