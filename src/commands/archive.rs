//! Archive command: fetch recent channel history, save attachments, write the transcript.

use std::path::PathBuf;

use tracing::info;

use crate::attachments::AttachmentSaver;
use crate::chat::{fetch_messages, resolve_channel, ChatPlatform};
use crate::config::Config;
use crate::error::Result;
use crate::export::{ensure_output_dirs, write_transcript};
use crate::session::DiscordSession;
use crate::transcript::TranscriptFormatter;

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub channel_name: String,
    pub transcript_path: PathBuf,
    pub message_count: usize,
    pub attachments_saved: usize,
    pub attachments_failed: usize,
}

pub async fn run(config: &Config) -> Result<ArchiveSummary> {
    let session = DiscordSession::connect_to(&config.api_base_url, &config.token).await?;
    let saver = AttachmentSaver::new(session.http_client(), config.files_dir());

    let result = archive_channel(&session, &saver, &TranscriptFormatter::local(), config).await;

    session.close();
    result
}

/// The whole pipeline against any platform.
pub async fn archive_channel<P>(
    platform: &P,
    saver: &AttachmentSaver,
    formatter: &TranscriptFormatter,
    config: &Config,
) -> Result<ArchiveSummary>
where
    P: ChatPlatform + ?Sized,
{
    ensure_output_dirs(&config.log_dir, saver.files_dir()).await?;

    let channel = resolve_channel(platform, &config.channel_id).await?;
    let messages = fetch_messages(platform, &channel, config.message_count).await?;
    info!("Got {} messages", messages.len());

    let transcript = formatter.render(&messages, saver).await;
    let transcript_path = write_transcript(&config.log_dir, &channel, &transcript.text).await?;

    info!(
        "Messages and attachments logged from {}. Total: {}",
        channel.name,
        messages.len()
    );

    Ok(ArchiveSummary {
        channel_name: channel.name,
        transcript_path,
        message_count: messages.len(),
        attachments_saved: transcript.attachments_saved,
        attachments_failed: transcript.attachments_failed,
    })
}
