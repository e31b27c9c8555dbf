//! Configuration for the archiver
//!
//! Everything comes from the environment (optionally seeded from a `.env`
//! file). Output locations are fixed.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Discord REST API base URL
pub const DISCORD_API_URL: &str = "https://discord.com/api/v10";

/// Messages archived when `MESSAGE_COUNT` is not set
pub const DEFAULT_MESSAGE_COUNT: usize = 200;
pub const MAX_MESSAGE_COUNT: usize = 1000;

/// Discord caps one history page at 100 messages
pub const PAGE_SIZE: usize = 100;

pub const LOG_DIR: &str = "logs";
pub const FILES_DIR: &str = "files";

/// Token variable, followed by its legacy alias
pub const TOKEN_VARS: [&str; 2] = ["DISCORD_TOKEN", "token"];
/// Channel variable, followed by its legacy alias
pub const CHANNEL_VARS: [&str; 2] = ["CHANNEL_ID", "channelId"];
pub const MESSAGE_COUNT_VAR: &str = "MESSAGE_COUNT";

/// Runtime configuration
#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub channel_id: String,
    pub message_count: usize,
    pub log_dir: PathBuf,
    pub api_base_url: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("token", &"***")
            .field("channel_id", &self.channel_id)
            .field("message_count", &self.message_count)
            .field("log_dir", &self.log_dir)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl Config {
    /// Load `.env` and read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = Self::first_non_blank(&lookup, &TOKEN_VARS)
            .ok_or_else(|| Error::MissingConfig(TOKEN_VARS[0].to_string()))?;
        let channel_id = Self::first_non_blank(&lookup, &CHANNEL_VARS)
            .ok_or_else(|| Error::MissingConfig(CHANNEL_VARS[0].to_string()))?;

        let message_count = match Self::first_non_blank(&lookup, &[MESSAGE_COUNT_VAR]) {
            Some(raw) => Self::parse_message_count(&raw)?,
            None => DEFAULT_MESSAGE_COUNT,
        };

        Ok(Self {
            token,
            channel_id,
            message_count,
            log_dir: PathBuf::from(LOG_DIR),
            api_base_url: DISCORD_API_URL.to_string(),
        })
    }

    /// Directory that receives downloaded attachments.
    pub fn files_dir(&self) -> PathBuf {
        self.log_dir.join(FILES_DIR)
    }

    /// Redirect output to another root (used by tests and embedders).
    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    fn parse_message_count(raw: &str) -> Result<usize> {
        let count: usize = raw.trim().parse().map_err(|_| {
            Error::InvalidArgument(format!("{} must be a number, got '{}'", MESSAGE_COUNT_VAR, raw))
        })?;

        if count == 0 || count > MAX_MESSAGE_COUNT {
            return Err(Error::InvalidArgument(format!(
                "{} must be between 1 and {}, got {}",
                MESSAGE_COUNT_VAR, MAX_MESSAGE_COUNT, count
            )));
        }

        Ok(count)
    }

    fn first_non_blank<F>(lookup: &F, keys: &[&str]) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        keys.iter()
            .filter_map(|key| lookup(key))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        // Try to load from current directory first, then parent
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }
}
