//! Output layout: directory setup and transcript writing

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::Channel;

/// Characters that are path separators or illegal on common filesystems.
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("valid regex"));

/// Make `name` usable as a single path component.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let cleaned = UNSAFE_CHARS.replace_all(name, "_");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Create the log directory and the attachment directory. Idempotent.
pub async fn ensure_output_dirs(log_dir: &Path, files_dir: &Path) -> Result<()> {
    for dir in [log_dir, files_dir] {
        tokio::fs::create_dir_all(dir).await?;
        debug!("Ensured directory {}", dir.display());
    }
    Ok(())
}

/// `<log_dir>/<channel name>.txt`
pub fn transcript_path(log_dir: &Path, channel: &Channel) -> PathBuf {
    let stem = sanitize_file_name(&channel.name).unwrap_or_else(|| channel.id.to_string());
    log_dir.join(format!("{}.txt", stem))
}

/// Write the transcript as the sole content of the channel's log file.
pub async fn write_transcript(log_dir: &Path, channel: &Channel, content: &str) -> Result<PathBuf> {
    let path = transcript_path(log_dir, channel);
    tokio::fs::write(&path, content).await?;
    info!("Saved: {}", path.display());
    Ok(path)
}
