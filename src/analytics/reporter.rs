//! Render history reporter.
//!
//! Reads the JSONL render log and provides:
//! - **Summary**: how many passes loaded, failed or stopped for input
//! - **Streams**: which streams were looked at most
//! - **Daily**: per-day render counts for `speckle-activity history`

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::analytics::logger::{self, RenderLogEntry};

// ---------------------------------------------------------------------------
// Aggregated history
// ---------------------------------------------------------------------------

/// Summary statistics for `speckle-activity history`.
#[derive(Debug, Serialize)]
pub struct History {
    pub total_renders: usize,
    pub states: StateDistribution,
    pub avg_duration_ms: u64,
    /// Failure count per error kind, most frequent first.
    pub error_kinds: Vec<(String, usize)>,
    pub stream_stats: Vec<StreamStat>,
    pub daily: Vec<DailyRenders>,
}

/// How render passes ended.
#[derive(Debug, Default, Serialize)]
pub struct StateDistribution {
    pub loaded: usize,
    pub awaiting_input: usize,
    pub failed: usize,
}

impl StateDistribution {
    pub fn total(&self) -> usize {
        self.loaded + self.awaiting_input + self.failed
    }

    /// Percentage for a given bucket, returns 0.0 if total is zero.
    pub fn pct(&self, count: usize) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (count as f64 / total as f64) * 100.0
        }
    }
}

/// Per-stream render statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStat {
    pub stream: String,
    pub renders: usize,
    pub failures: usize,
    /// Commit count seen by the most recent successful render.
    pub last_commits: Option<usize>,
}

/// A single day of render activity.
#[derive(Debug, Clone, Serialize)]
pub struct DailyRenders {
    pub date: String,
    pub renders: usize,
    pub failures: usize,
    pub avg_duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Compute render history from the log at `path`, optionally limited to
/// the last `days` days.
pub fn compute_history(path: &Path, days: Option<u32>) -> History {
    let entries = logger::read_entries_since_days(path, days);
    build_history(&entries)
}

pub(crate) fn build_history(entries: &[RenderLogEntry]) -> History {
    History {
        total_renders: entries.len(),
        states: compute_state_distribution(entries),
        avg_duration_ms: avg_duration(entries.iter()),
        error_kinds: compute_error_kinds(entries),
        stream_stats: compute_stream_stats(entries),
        daily: compute_daily(entries),
    }
}

fn avg_duration<'a, I>(entries: I) -> u64
where
    I: Iterator<Item = &'a RenderLogEntry>,
{
    let (sum, count) = entries.fold((0u64, 0u64), |(sum, count), e| {
        (sum + e.duration_ms, count + 1)
    });
    if count == 0 { 0 } else { sum / count }
}

fn compute_state_distribution(entries: &[RenderLogEntry]) -> StateDistribution {
    let mut dist = StateDistribution::default();
    for entry in entries {
        match entry.state.as_str() {
            "loaded" => dist.loaded += 1,
            "error" => dist.failed += 1,
            _ => dist.awaiting_input += 1,
        }
    }
    dist
}

fn compute_error_kinds(entries: &[RenderLogEntry]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for entry in entries.iter().filter(|e| e.is_error()) {
        let kind = entry.error_kind.clone().unwrap_or_else(|| "unknown".to_string());
        *counts.entry(kind).or_default() += 1;
    }

    let mut kinds: Vec<(String, usize)> = counts.into_iter().collect();
    kinds.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    kinds
}

/// Group entries by stream name, most rendered first. Passes that never got
/// as far as a stream are left out.
fn compute_stream_stats(entries: &[RenderLogEntry]) -> Vec<StreamStat> {
    let mut groups: HashMap<&str, Vec<&RenderLogEntry>> = HashMap::new();
    for entry in entries {
        if let Some(stream) = entry.stream.as_deref() {
            groups.entry(stream).or_default().push(entry);
        }
    }

    let mut stats: Vec<StreamStat> = groups
        .into_iter()
        .map(|(stream, group)| {
            // Log order is chronological.
            let last_commits = group
                .iter()
                .rev()
                .find(|e| e.state == "loaded")
                .and_then(|e| e.commits);

            StreamStat {
                stream: stream.to_string(),
                renders: group.len(),
                failures: group.iter().filter(|e| e.is_error()).count(),
                last_commits,
            }
        })
        .collect();

    stats.sort_by(|a, b| b.renders.cmp(&a.renders).then_with(|| a.stream.cmp(&b.stream)));
    stats
}

fn compute_daily(entries: &[RenderLogEntry]) -> Vec<DailyRenders> {
    let mut daily: HashMap<String, Vec<&RenderLogEntry>> = HashMap::new();
    for entry in entries {
        // RFC 3339 timestamp: first 10 chars are YYYY-MM-DD
        let date = entry.timestamp.get(..10).unwrap_or("unknown").to_string();
        daily.entry(date).or_default().push(entry);
    }

    let mut days: Vec<DailyRenders> = daily
        .into_iter()
        .map(|(date, group)| DailyRenders {
            date,
            renders: group.len(),
            failures: group.iter().filter(|e| e.is_error()).count(),
            avg_duration_ms: avg_duration(group.iter().copied()),
        })
        .collect();

    days.sort_by(|a, b| a.date.cmp(&b.date));
    days
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
