//! Platform-neutral types the archiver works with.

use chrono::{DateTime, Utc};

/// A fetched chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: u64,
    pub content: String,
    pub author_tag: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
}

/// A file referenced by a message. The bytes are only reachable through `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: u64,
    pub name: String,
    pub url: String,
}

/// Discord channel type codes the archiver cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    GuildText,
    Dm,
    GuildVoice,
    GroupDm,
    GuildCategory,
    GuildAnnouncement,
    AnnouncementThread,
    PublicThread,
    PrivateThread,
    GuildStageVoice,
    GuildDirectory,
    GuildForum,
    GuildMedia,
    Unknown(u8),
}

impl ChannelKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ChannelKind::GuildText,
            1 => ChannelKind::Dm,
            2 => ChannelKind::GuildVoice,
            3 => ChannelKind::GroupDm,
            4 => ChannelKind::GuildCategory,
            5 => ChannelKind::GuildAnnouncement,
            10 => ChannelKind::AnnouncementThread,
            11 => ChannelKind::PublicThread,
            12 => ChannelKind::PrivateThread,
            13 => ChannelKind::GuildStageVoice,
            14 => ChannelKind::GuildDirectory,
            15 => ChannelKind::GuildForum,
            16 => ChannelKind::GuildMedia,
            other => ChannelKind::Unknown(other),
        }
    }

    /// Whether the channel carries a readable message history.
    pub fn is_text_based(self) -> bool {
        matches!(
            self,
            ChannelKind::GuildText
                | ChannelKind::Dm
                | ChannelKind::GuildVoice
                | ChannelKind::GroupDm
                | ChannelKind::GuildAnnouncement
                | ChannelKind::AnnouncementThread
                | ChannelKind::PublicThread
                | ChannelKind::PrivateThread
                | ChannelKind::GuildStageVoice
        )
    }
}

/// A resolved channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: u64,
    pub name: String,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn is_text_based(&self) -> bool {
        self.kind.is_text_based()
    }
}
