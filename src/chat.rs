//! Chat operations: channel resolution and history pagination

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::PAGE_SIZE;
use crate::error::{Error, Result};
use crate::models::{Channel, Message};

/// What the archiver needs from a chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Look a channel up by id. `None` when it does not exist or is not visible.
    async fn fetch_channel(&self, channel_id: u64) -> Result<Option<Channel>>;

    /// Up to `limit` messages older than `before` (newest when unset), newest first.
    async fn fetch_messages(
        &self,
        channel_id: u64,
        limit: usize,
        before: Option<u64>,
    ) -> Result<Vec<Message>>;
}

/// Resolve a channel id and make sure it has a message history.
pub async fn resolve_channel<P>(platform: &P, channel_id: &str) -> Result<Channel>
where
    P: ChatPlatform + ?Sized,
{
    let invalid = || Error::InvalidChannel(channel_id.to_string());

    let id: u64 = channel_id
        .trim()
        .parse()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(invalid)?;

    let channel = platform.fetch_channel(id).await?.ok_or_else(invalid)?;
    if !channel.is_text_based() {
        return Err(invalid());
    }

    info!("Fetching and saving messages from {}...", channel.name);
    Ok(channel)
}

/// Fetch up to `total` most recent messages, newest first.
///
/// Pages are requested one after another, each one strictly older than the
/// previous. Stops early once the channel runs out of history.
pub async fn fetch_messages<P>(platform: &P, channel: &Channel, total: usize) -> Result<Vec<Message>>
where
    P: ChatPlatform + ?Sized,
{
    let mut messages: Vec<Message> = Vec::new();
    let mut cursor: Option<u64> = None;

    while messages.len() < total {
        let limit = PAGE_SIZE.min(total - messages.len());
        let mut page = platform.fetch_messages(channel.id, limit, cursor).await?;

        // Anything at or after the cursor was already collected.
        if let Some(cursor) = cursor {
            let before = page.len();
            page.retain(|m| m.id < cursor);
            if page.len() < before {
                warn!("Dropped {} messages not older than {}", before - page.len(), cursor);
            }
        }
        page.truncate(limit);

        let Some(oldest) = page.iter().map(|m| m.id).min() else {
            debug!("History of {} exhausted", channel.name);
            break;
        };

        debug!(
            "Fetched page of {} messages (before {:?})",
            page.len(),
            cursor
        );
        messages.extend(page);
        cursor = Some(oldest);
    }

    Ok(messages)
}
