use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::config::schema::LoggingConfig;

// ---------------------------------------------------------------------------
// Render log entry (JSONL)
// ---------------------------------------------------------------------------

/// A single entry in the render log (`~/.speckle-activity/render-log.jsonl`).
///
/// One line per render pass, successful or not. Used by the reporter for
/// `speckle-activity history`. Never contains the access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderLogEntry {
    pub timestamp: String,
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stream: Option<String>,
    /// Final state of the pass: `"awaiting_credentials"`,
    /// `"awaiting_stream_selection"`, `"loaded"` or `"error"`.
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub branches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub commits: Option<usize>,
    pub duration_ms: u64,
    /// Error variant name, see `DashboardError::kind`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl RenderLogEntry {
    /// Start an entry stamped with the current time.
    pub fn now(server: &str, stream: Option<&str>, state: &str, duration_ms: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            server: server.to_string(),
            stream: stream.map(str::to_string),
            state: state.to_string(),
            branches: None,
            commits: None,
            duration_ms,
            error_kind: None,
            error: None,
        }
    }

    /// Whether the pass ended in an error.
    pub fn is_error(&self) -> bool {
        self.state == "error"
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Append a render pass to the log configured in `[logging]`.
///
/// Best-effort: a log write failure never fails the render pass.
pub fn log_render(config: &LoggingConfig, entry: &RenderLogEntry) {
    if !config.enabled {
        return;
    }
    if let Some(path) = render_log_path(config) {
        let _ = append_log_entry(&path, entry);
    }
}

// ---------------------------------------------------------------------------
// Reading log entries
// ---------------------------------------------------------------------------

/// Read all entries from a render log file.
///
/// Silently skips malformed lines. Returns an empty vec if the file does not
/// exist or cannot be read.
pub fn read_all_entries(path: &Path) -> Vec<RenderLogEntry> {
    let Ok(file) = fs::File::open(path) else {
        return Vec::new();
    };

    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter_map(|line| serde_json::from_str::<RenderLogEntry>(&line).ok())
        .collect()
}

/// Read entries newer than `now - days`; all entries if `days` is `None`.
pub fn read_entries_since_days(path: &Path, days: Option<u32>) -> Vec<RenderLogEntry> {
    filter_since_days(read_all_entries(path), days, Utc::now())
}

/// Keep entries whose timestamp is at or after `now - days`.
fn filter_since_days(
    entries: Vec<RenderLogEntry>,
    days: Option<u32>,
    now: DateTime<Utc>,
) -> Vec<RenderLogEntry> {
    let Some(days) = days else {
        return entries;
    };

    let cutoff = now - chrono::Duration::days(i64::from(days));

    entries
        .into_iter()
        .filter(|e| {
            DateTime::parse_from_rfc3339(&e.timestamp)
                .map(|ts| ts.with_timezone(&Utc) >= cutoff)
                .unwrap_or(false)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

fn append_log_entry(path: &Path, entry: &RenderLogEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(entry)?;
    writeln!(file, "{json}")?;

    Ok(())
}

/// Resolve the render log path from config, expanding `~`.
pub fn render_log_path(config: &LoggingConfig) -> Option<PathBuf> {
    config::expand_home(&config.path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn logging_to(path: &Path) -> LoggingConfig {
        LoggingConfig {
            enabled: true,
            path: path.to_string_lossy().into_owned(),
        }
    }

    #[test]
    fn log_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("render-log.jsonl");
        let config = logging_to(&path);

        let mut loaded = RenderLogEntry::now("speckle.xyz", Some("Tower"), "loaded", 120);
        loaded.commits = Some(42);
        log_render(&config, &loaded);
        log_render(
            &config,
            &RenderLogEntry::now("speckle.xyz", None, "awaiting_credentials", 0),
        );

        let entries = read_all_entries(&path);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].stream.as_deref(), Some("Tower"));
        assert_eq!(entries[0].commits, Some(42));
        assert_eq!(entries[1].state, "awaiting_credentials");
    }

    #[test]
    fn disabled_logging_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render-log.jsonl");
        let mut config = logging_to(&path);
        config.enabled = false;

        log_render(&config, &RenderLogEntry::now("speckle.xyz", None, "loaded", 1));
        assert!(!path.exists());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render-log.jsonl");
        let good = serde_json::to_string(&RenderLogEntry::now("s", None, "loaded", 3)).unwrap();
        fs::write(&path, format!("not json\n{good}\n{{\"half\": \n")).unwrap();

        assert_eq!(read_all_entries(&path).len(), 1);
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_all_entries(&dir.path().join("nope.jsonl")).is_empty());
    }

    #[test]
    fn filter_since_days_uses_cutoff() {
        let now = DateTime::parse_from_rfc3339("2024-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut old = RenderLogEntry::now("s", None, "loaded", 1);
        old.timestamp = "2024-03-01T12:00:00+00:00".to_string();
        let mut recent = RenderLogEntry::now("s", None, "loaded", 1);
        recent.timestamp = "2024-03-09T08:00:00+00:00".to_string();

        let kept = filter_since_days(vec![old.clone(), recent.clone()], Some(7), now);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp, recent.timestamp);

        assert_eq!(filter_since_days(vec![old, recent], None, now).len(), 2);
    }

    #[test]
    fn serialized_entry_omits_empty_fields() {
        let json = serde_json::to_string(&RenderLogEntry::now("s", None, "loaded", 1)).unwrap();
        assert!(!json.contains("error"));
        assert!(!json.contains("stream"));
    }
}
