//! Command implementations

pub mod archive;

// Re-export commonly used types
pub use archive::{archive_channel, run as archive_run, ArchiveSummary};
