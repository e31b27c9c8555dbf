//! Discord Channel Archiver Library
//!
//! This library provides tools to:
//! - Connect to Discord with a bot token and resolve a text channel
//! - Page backward through the channel's most recent messages
//! - Render them into a plain-text transcript
//! - Download every message attachment next to the transcript

pub mod attachments;
pub mod chat;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod session;
pub mod transcript;

// Re-export common types
pub use attachments::{AttachmentOutcome, AttachmentSaver};
pub use chat::{fetch_messages, resolve_channel, ChatPlatform};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{Attachment, Channel, ChannelKind, Message};
pub use session::DiscordSession;
pub use transcript::{Transcript, TranscriptFormatter};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
