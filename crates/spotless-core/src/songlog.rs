//! Append-only CSV song log.
//!
//! One row per track, written on the first reconciliation pass that sees a
//! new content identifier. The attribute values arrive as one
//! newline-separated blob from a single batched automation call; sanitation
//! turns that blob into a CSV row (commas inside fields become semicolons,
//! the newlines become column separators) and appends a local timestamp.
//! The file is created with a header row when absent and never rewritten.

use chrono::{DateTime, Local};
use std::path::Path;
use tracing::info;

/// Spotify track attributes, in column order. These are the AppleScript
/// property names and double as the CSV header.
pub const TRACK_ATTRIBUTES: [&str; 12] = [
    "name",
    "artist",
    "album",
    "disc number",
    "duration",
    "played count",
    "track number",
    "popularity",
    "id",
    "artwork url",
    "album artist",
    "spotify url",
];

pub fn header_row() -> String {
    format!("{},date\n", TRACK_ATTRIBUTES.join(","))
}

pub fn format_timestamp(ts: &DateTime<Local>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S %z").to_string()
}

/// Turn the raw batched attribute output into one CSV row. Returns `None`
/// when the output is empty (the automation call came back with nothing),
/// in which case the caller skips the write for this pass.
pub fn format_row(raw: &str, ts: &DateTime<Local>) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let row = trimmed
        .replace(',', ";")
        .replace("\r\n", "\n")
        .replace(['\n', '\r'], ",");
    Some(format!("{},{}\n", row, format_timestamp(ts)))
}

/// Append one pre-formatted row, creating the file (plus header) on first
/// use. Errors here are the caller's to swallow; logging must never take
/// the reconciliation loop down.
pub async fn append_row(path: &Path, row: &str) -> anyhow::Result<()> {
    let exists = path.exists();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut f = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    use tokio::io::AsyncWriteExt;
    if !exists {
        f.write_all(header_row().as_bytes()).await?;
    }
    f.write_all(row.as_bytes()).await?;
    info!("song log: appended row to {}", path.display());
    Ok(())
}

/// Dedup state: remembers the last content identifier handed to the log so
/// repeated wake-ups during one track produce a single row.
#[derive(Debug, Default)]
pub struct SongLogger {
    last_logged_id: String,
}

impl SongLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once per distinct consecutive identifier and
    /// records it. Recorded up front so a failed attribute fetch is not
    /// retried for the same track on the next wake-up.
    pub fn mark_new(&mut self, content_id: &str) -> bool {
        if content_id == self.last_logged_id {
            return false;
        }
        self.last_logged_id = content_id.to_string();
        true
    }
}
