//! Attachment downloads.
//!
//! Every attachment is streamed into the files directory. A failed download
//! is reported back as a transcript line and never aborts the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::export::sanitize_file_name;
use crate::models::{Attachment, Message};

/// Result of saving one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentOutcome {
    pub url: String,
    pub path: PathBuf,
    /// Rendered `Failed to save: ...` text when the download failed
    pub failure: Option<String>,
}

impl AttachmentOutcome {
    pub fn is_saved(&self) -> bool {
        self.failure.is_none()
    }

    /// Transcript line(s) for this attachment.
    pub fn line(&self) -> String {
        match &self.failure {
            None => format!("- URL: {}", self.url),
            Some(failure) => format!("- URL: {}\n  {}", self.url, failure),
        }
    }
}

/// File name an attachment is stored under, before collision handling.
pub fn base_file_name(attachment: &Attachment) -> String {
    sanitize_file_name(&attachment.name).unwrap_or_else(|| format!("attachment-{}", attachment.id))
}

/// Assign every attachment a distinct file name.
///
/// The first attachment to use a name keeps it. Later ones are prefixed with
/// their message id, plus a counter if that is still taken.
pub fn plan_file_names(messages: &[Message]) -> Vec<Vec<String>> {
    let mut claimed: HashSet<String> = HashSet::new();

    messages
        .iter()
        .map(|message| {
            message
                .attachments
                .iter()
                .map(|attachment| {
                    let base = base_file_name(attachment);
                    let mut candidate = base.clone();
                    let mut n = 1;
                    while claimed.contains(&candidate) {
                        candidate = if n == 1 {
                            format!("{}_{}", message.id, base)
                        } else {
                            format!("{}_{}_{}", message.id, n, base)
                        };
                        n += 1;
                    }
                    claimed.insert(candidate.clone());
                    candidate
                })
                .collect()
        })
        .collect()
}

/// Downloads attachments into a single directory.
#[derive(Debug, Clone)]
pub struct AttachmentSaver {
    http: Client,
    files_dir: PathBuf,
}

impl AttachmentSaver {
    pub fn new<P: Into<PathBuf>>(http: Client, files_dir: P) -> Self {
        Self {
            http,
            files_dir: files_dir.into(),
        }
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Destination paths for every attachment, shaped like `messages`.
    pub fn plan(&self, messages: &[Message]) -> Vec<Vec<PathBuf>> {
        plan_file_names(messages)
            .into_iter()
            .map(|names| names.into_iter().map(|n| self.files_dir.join(n)).collect())
            .collect()
    }

    /// Download one attachment to `dest`, overwriting whatever is there.
    pub async fn save(&self, attachment: &Attachment, dest: &Path) -> Result<u64> {
        match self.download(&attachment.url, dest).await {
            Ok(bytes) => {
                debug!("Saved {} ({} bytes)", dest.display(), bytes);
                Ok(bytes)
            }
            Err(err) => {
                let reason = match err {
                    Error::HttpError(msg) => msg,
                    Error::IoError(e) => e.to_string(),
                    other => other.to_string(),
                };
                warn!("Failed to save {}: {}", attachment.name, reason);
                Err(Error::AttachmentDownload {
                    name: attachment.name.clone(),
                    reason,
                })
            }
        }
    }

    /// Save all attachments of one message concurrently, keeping their order.
    pub async fn save_all(&self, attachments: &[Attachment], dests: &[PathBuf]) -> Vec<AttachmentOutcome> {
        debug_assert_eq!(attachments.len(), dests.len());
        join_all(attachments.iter().zip(dests).map(|(attachment, dest)| async move {
            let failure = self.save(attachment, dest).await.err().map(|e| e.to_string());
            AttachmentOutcome {
                url: attachment.url.clone(),
                path: dest.clone(),
                failure,
            }
        }))
        .await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("HTTP {}", status)));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let written = async {
            let mut stream = response.bytes_stream();
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, Error>(written)
        }
        .await;

        if written.is_err() {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
        }
        written
    }
}
