//! Tests for the archive command against an in-memory platform

use std::path::Path;

use async_trait::async_trait;
use chrono::{FixedOffset, TimeZone, Utc};
use httpmock::prelude::*;
use reqwest::Client;
use tempfile::tempdir;

use discord_archiver::commands::archive_channel;
use discord_archiver::config::DEFAULT_MESSAGE_COUNT;
use discord_archiver::{
    Attachment, AttachmentSaver, Channel, ChannelKind, ChatPlatform, Config, Error, Message,
    Result, TranscriptFormatter,
};

struct MemoryPlatform {
    channel: Channel,
    /// Newest first
    messages: Vec<Message>,
}

#[async_trait]
impl ChatPlatform for MemoryPlatform {
    async fn fetch_channel(&self, channel_id: u64) -> Result<Option<Channel>> {
        Ok(Some(self.channel.clone()).filter(|c| c.id == channel_id))
    }

    async fn fetch_messages(
        &self,
        _channel_id: u64,
        limit: usize,
        before: Option<u64>,
    ) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .iter()
            .filter(|m| before.map_or(true, |b| m.id < b))
            .take(limit)
            .cloned()
            .collect())
    }
}

fn channel(kind: ChannelKind) -> Channel {
    Channel {
        id: 123,
        name: "general".to_string(),
        kind,
    }
}

fn message(id: u64, content: &str, attachments: Vec<Attachment>) -> Message {
    Message {
        id,
        content: content.to_string(),
        author_tag: "alice".to_string(),
        created_at: Utc.timestamp_opt(1_709_482_530 + id as i64, 0).unwrap(),
        edited_at: None,
        attachments,
    }
}

fn config(log_dir: &Path, channel_id: &str) -> Config {
    Config {
        token: "unused".to_string(),
        channel_id: channel_id.to_string(),
        message_count: DEFAULT_MESSAGE_COUNT,
        log_dir: log_dir.to_path_buf(),
        api_base_url: "http://127.0.0.1:9".to_string(),
    }
}

fn formatter() -> TranscriptFormatter {
    TranscriptFormatter::with_offset(FixedOffset::east_opt(0).unwrap())
}

#[tokio::test]
async fn failed_download_is_recorded_and_run_completes() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/cdn/ok.png");
        then.status(200).body("png");
    });
    server.mock(|when, then| {
        when.method(GET).path("/cdn/broken.png");
        then.status(404);
    });

    let temp = tempdir().expect("tempdir");
    let logs = temp.path().join("logs");
    let config = config(&logs, "123");

    let platform = MemoryPlatform {
        channel: channel(ChannelKind::GuildText),
        messages: vec![
            message(
                2,
                "second",
                vec![Attachment {
                    id: 20,
                    name: "broken.png".to_string(),
                    url: server.url("/cdn/broken.png"),
                }],
            ),
            message(
                1,
                "first",
                vec![Attachment {
                    id: 10,
                    name: "ok.png".to_string(),
                    url: server.url("/cdn/ok.png"),
                }],
            ),
        ],
    };
    let saver = AttachmentSaver::new(Client::new(), config.files_dir());

    let summary = archive_channel(&platform, &saver, &formatter(), &config)
        .await
        .unwrap();

    assert_eq!(summary.message_count, 2);
    assert_eq!(summary.attachments_saved, 1);
    assert_eq!(summary.attachments_failed, 1);
    assert_eq!(summary.transcript_path, logs.join("general.txt"));

    let text = std::fs::read_to_string(&summary.transcript_path).unwrap();
    let blocks: Vec<&str> = text.split("\n\n").collect();
    assert_eq!(blocks.len(), 2);

    assert!(blocks[0].starts_with("second\n"));
    assert!(blocks[0].ends_with(&format!(
        "Attachments:\n- URL: {}\n  Failed to save: broken.png (HTTP 404 Not Found)",
        server.url("/cdn/broken.png")
    )));

    assert!(blocks[1].starts_with("first\n"));
    assert!(blocks[1].ends_with(&format!("Attachments:\n- URL: {}", server.url("/cdn/ok.png"))));

    assert_eq!(std::fs::read(logs.join("files").join("ok.png")).unwrap(), b"png");
    assert!(!logs.join("files").join("broken.png").exists());
}

#[tokio::test]
async fn invalid_channel_aborts_before_transcript() {
    let temp = tempdir().expect("tempdir");
    let logs = temp.path().join("logs");
    let config = config(&logs, "123");

    let platform = MemoryPlatform {
        channel: channel(ChannelKind::GuildForum),
        messages: vec![message(1, "hidden", vec![])],
    };
    let saver = AttachmentSaver::new(Client::new(), config.files_dir());

    let err = archive_channel(&platform, &saver, &formatter(), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidChannel(ref id) if id == "123"));
    assert!(!logs.join("general.txt").exists());
    // Directories are still prepared up front.
    assert!(logs.join("files").is_dir());
}

#[tokio::test]
async fn unresolved_channel_aborts_before_transcript() {
    let temp = tempdir().expect("tempdir");
    let logs = temp.path().join("logs");
    let config = config(&logs, "999");

    let platform = MemoryPlatform {
        channel: channel(ChannelKind::GuildText),
        messages: vec![],
    };
    let saver = AttachmentSaver::new(Client::new(), config.files_dir());

    let err = archive_channel(&platform, &saver, &formatter(), &config)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Invalid text channel: 999");
    assert!(!logs.join("general.txt").exists());
}

#[tokio::test]
async fn every_message_appears_once_in_fetch_order() {
    let temp = tempdir().expect("tempdir");
    let logs = temp.path().join("logs");
    let mut config = config(&logs, "123");
    config.message_count = 250;

    let messages: Vec<Message> = (1..=400u64)
        .rev()
        .map(|id| message(id, &format!("msg-{}", id), vec![]))
        .collect();
    let platform = MemoryPlatform {
        channel: channel(ChannelKind::GuildText),
        messages,
    };
    let saver = AttachmentSaver::new(Client::new(), config.files_dir());

    let summary = archive_channel(&platform, &saver, &formatter(), &config)
        .await
        .unwrap();
    assert_eq!(summary.message_count, 250);

    let text = std::fs::read_to_string(&summary.transcript_path).unwrap();
    let contents: Vec<&str> = text
        .split("\n\n")
        .map(|block| block.lines().next().unwrap())
        .collect();
    let expected: Vec<String> = (151..=400u64).rev().map(|id| format!("msg-{}", id)).collect();
    assert_eq!(contents, expected);
}

#[tokio::test]
async fn edited_messages_get_edit_line() {
    let temp = tempdir().expect("tempdir");
    let logs = temp.path().join("logs");
    let config = config(&logs, "123");

    let mut edited = message(2, "edited", vec![]);
    edited.edited_at = Some(Utc.with_ymd_and_hms(2024, 3, 3, 16, 15, 30).unwrap());
    let platform = MemoryPlatform {
        channel: channel(ChannelKind::PublicThread),
        messages: vec![edited, message(1, "plain", vec![])],
    };
    let saver = AttachmentSaver::new(Client::new(), config.files_dir());

    let summary = archive_channel(&platform, &saver, &formatter(), &config)
        .await
        .unwrap();

    let text = std::fs::read_to_string(&summary.transcript_path).unwrap();
    let blocks: Vec<&str> = text.split("\n\n").collect();
    assert!(blocks[0].contains("\n-- Edited At: March 03, 2024 04:15:30 PM"));
    assert!(!blocks[1].contains("Edited At"));
    assert!(!text.contains("Attachments:"));
}

#[tokio::test]
async fn empty_channel_writes_empty_transcript() {
    let temp = tempdir().expect("tempdir");
    let logs = temp.path().join("logs");
    let config = config(&logs, "123");

    let platform = MemoryPlatform {
        channel: channel(ChannelKind::GuildText),
        messages: vec![],
    };
    let saver = AttachmentSaver::new(Client::new(), config.files_dir());

    let summary = archive_channel(&platform, &saver, &formatter(), &config)
        .await
        .unwrap();

    assert_eq!(summary.message_count, 0);
    assert_eq!(std::fs::read_to_string(&summary.transcript_path).unwrap(), "");
}
