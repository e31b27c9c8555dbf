//! Error types for the Discord archiver

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required environment variable: {0}")]
    MissingConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Invalid text channel: {0}")]
    InvalidChannel(String),

    #[error("Discord API error: {0}")]
    DiscordError(String),

    #[error("Failed to save: {name} ({reason})")]
    AttachmentDownload { name: String, reason: String },

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
