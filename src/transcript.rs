//! Transcript formatting.
//!
//! Each message becomes one block:
//!
//! ```text
//! <content>
//! ---- Sent By: <author tag>
//! --------- At: <created>
//! -- Edited At: <edited>      (edited messages only)
//! Attachments:                (messages with attachments only)
//! - URL: <url>
//! ```
//!
//! Blocks are separated by a blank line and keep the order they were fetched in.

use std::fmt::Display;

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use futures::future::join_all;

use crate::attachments::{AttachmentOutcome, AttachmentSaver};
use crate::models::Message;

/// e.g. `March 03, 2024 04:15:30 PM`
pub const TIMESTAMP_FORMAT: &str = "%B %d, %Y %I:%M:%S %p";

pub fn format_timestamp<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// A fully rendered transcript plus attachment statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub attachments_saved: usize,
    pub attachments_failed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptFormatter {
    /// `None` renders in the machine's local time zone
    offset: Option<FixedOffset>,
}

impl TranscriptFormatter {
    pub fn local() -> Self {
        Self { offset: None }
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self {
            offset: Some(offset),
        }
    }

    pub fn timestamp(&self, timestamp: &DateTime<Utc>) -> String {
        match self.offset {
            Some(offset) => format_timestamp(&timestamp.with_timezone(&offset)),
            None => format_timestamp(&timestamp.with_timezone(&Local)),
        }
    }

    /// Render a single message block from already-produced attachment lines.
    pub fn format_block(&self, message: &Message, attachment_lines: &[String]) -> String {
        let mut block = format!(
            "{}\n---- Sent By: {}\n--------- At: {}",
            message.content,
            message.author_tag,
            self.timestamp(&message.created_at)
        );

        if let Some(edited_at) = &message.edited_at {
            block.push_str("\n-- Edited At: ");
            block.push_str(&self.timestamp(edited_at));
        }

        if !attachment_lines.is_empty() {
            block.push_str("\nAttachments:\n");
            block.push_str(&attachment_lines.join("\n"));
        }

        block
    }

    /// Download every attachment and render the whole transcript.
    ///
    /// All messages are processed concurrently; the output keeps the input order.
    pub async fn render(&self, messages: &[Message], saver: &AttachmentSaver) -> Transcript {
        let plan = saver.plan(messages);

        let rendered = join_all(messages.iter().zip(&plan).map(|(message, dests)| async move {
            let outcomes = if message.attachments.is_empty() {
                Vec::new()
            } else {
                saver.save_all(&message.attachments, dests).await
            };
            let lines: Vec<String> = outcomes.iter().map(AttachmentOutcome::line).collect();
            (self.format_block(message, &lines), outcomes)
        }))
        .await;

        let mut transcript = Transcript::default();
        let mut blocks = Vec::with_capacity(rendered.len());
        for (block, outcomes) in rendered {
            let saved = outcomes.iter().filter(|o| o.is_saved()).count();
            transcript.attachments_saved += saved;
            transcript.attachments_failed += outcomes.len() - saved;
            blocks.push(block);
        }

        transcript.text = blocks.join("\n\n").trim().to_string();
        transcript
    }
}
