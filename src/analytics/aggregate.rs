//! Aggregation functions: fetched entities in, display-ready tables out.
//!
//! Everything here is pure: no I/O, no config. The dashboard controller calls
//! these in order and aborts the render pass on the first error.
//!
//! Ordering rules:
//! - Deduplication and distributions keep **first-seen** order.
//! - The commit timeline is sorted ascending by date and gap-filled.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{DashboardError, DashboardResult};
use crate::speckle::client::server_base_url;
use crate::speckle::{Branch, Commit, Stream};

// ---------------------------------------------------------------------------
// Table rows
// ---------------------------------------------------------------------------

/// Unique items in first-seen order, plus how many there are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Distinct<T> {
    pub items: Vec<T>,
    pub count: usize,
}

/// One row of the branch bar chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchCommitCount {
    pub branch: String,
    pub commit_count: usize,
}

/// One slice of a donut chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Share {
    pub label: String,
    pub count: usize,
}

/// One point of the commit activity timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Viewer URL that embeds one commit of a stream.
pub fn commit_embed_url(server: &str, stream: &Stream, commit: &Commit) -> String {
    format!(
        "{}/embed?stream={}&commit={}",
        server_base_url(server),
        stream.id,
        commit.id
    )
}

/// Render items as a markdown bullet list, one `"- {item} \n"` per item.
pub fn to_bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!("- {} \n", item.as_ref()))
        .collect()
}

// ---------------------------------------------------------------------------
// Counting
// ---------------------------------------------------------------------------

/// Remove duplicates, keeping the first occurrence of each item in place.
pub fn count_distinct<T, I>(items: I) -> Distinct<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen: HashSet<T> = HashSet::new();
    let mut unique = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            unique.push(item);
        }
    }
    let count = unique.len();
    Distinct {
        items: unique,
        count,
    }
}

/// Occurrence count per label, labels in first-seen order.
fn tally<'a, I>(labels: I) -> Vec<Share>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut shares: Vec<Share> = Vec::new();
    for label in labels {
        match index.get(label) {
            Some(&i) => shares[i].count += 1,
            None => {
                index.insert(label, shares.len());
                shares.push(Share {
                    label: label.to_string(),
                    count: 1,
                });
            }
        }
    }
    shares
}

/// `(name, commit count)` per branch, same length and order as the input.
pub fn branch_commit_counts(branches: &[Branch]) -> Vec<BranchCommitCount> {
    branches
        .iter()
        .map(|b| BranchCommitCount {
            branch: b.name.clone(),
            commit_count: b.commit_count,
        })
        .collect()
}

/// How many commits each source application produced.
pub fn source_application_distribution(commits: &[Commit]) -> Vec<Share> {
    tally(commits.iter().map(|c| c.source_application.as_str()))
}

/// How many commits each author made.
pub fn author_distribution(commits: &[Commit]) -> Vec<Share> {
    tally(commits.iter().map(|c| c.author_name.as_str()))
}

/// Commits per UTC calendar date, every day from the first to the last
/// commit date inclusive, zero-filled.
///
/// Fails with [`DashboardError::EmptyData`] when there are no commits.
pub fn commit_timeline(commits: &[Commit]) -> DashboardResult<Vec<DailyCount>> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for commit in commits {
        *per_day.entry(commit.created_at.date_naive()).or_default() += 1;
    }

    let (Some((&first, _)), Some((&last, _))) =
        (per_day.first_key_value(), per_day.last_key_value())
    else {
        return Err(DashboardError::EmptyData(
            "cannot build a timeline without commits".to_string(),
        ));
    };

    Ok(first
        .iter_days()
        .take_while(|day| *day <= last)
        .map(|date| DailyCount {
            date,
            count: per_day.get(&date).copied().unwrap_or(0),
        })
        .collect())
}

/// Percentage of `count` in `total`, 0.0 for an empty total.
pub fn share_pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (count as f64 / total as f64) * 100.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
