//! Property tests for the aggregation functions.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use speckle_activity::analytics::aggregate::{
    author_distribution, branch_commit_counts, commit_timeline, count_distinct,
    source_application_distribution, to_bullet_list,
};
use speckle_activity::speckle::{Branch, Commit};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn branch() -> impl Strategy<Value = Branch> {
    ("[a-z][a-z0-9/_-]{0,15}", 0usize..500).prop_map(|(name, commit_count)| Branch {
        name,
        commit_count,
        description: None,
    })
}

/// Commits within roughly a year of 2023-01-01, in any order.
fn commit() -> impl Strategy<Value = Commit> {
    (
        "[a-f0-9]{10}",
        prop::sample::select(vec!["Ada", "Linus", "Grace", "unknown"]),
        prop::sample::select(vec!["Rhino", "Revit", "Grasshopper", "Blender"]),
        0i64..(400 * 24 * 60),
    )
        .prop_map(|(id, author, app, minutes)| Commit {
            id,
            author_name: author.to_string(),
            source_application: app.to_string(),
            created_at: base_time() + Duration::minutes(minutes),
            message: None,
            branch_name: None,
        })
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

proptest! {
    #[test]
    fn branch_counts_preserve_length_and_order(branches in prop::collection::vec(branch(), 0..30)) {
        let rows = branch_commit_counts(&branches);
        prop_assert_eq!(rows.len(), branches.len());
        for (row, branch) in rows.iter().zip(&branches) {
            prop_assert_eq!(&row.branch, &branch.name);
            prop_assert_eq!(row.commit_count, branch.commit_count);
        }
    }

    #[test]
    fn count_distinct_is_idempotent(items in prop::collection::vec("[a-c]{1,2}", 0..40)) {
        let once = count_distinct(items.clone());
        let twice = count_distinct(once.items.clone());
        prop_assert_eq!(&once, &twice);

        let unique: HashSet<&String> = items.iter().collect();
        prop_assert_eq!(once.count, unique.len());
    }

    #[test]
    fn count_distinct_keeps_first_occurrence(items in prop::collection::vec(0u8..6, 0..40)) {
        let d = count_distinct(items.clone());
        let positions: Vec<usize> = d
            .items
            .iter()
            .map(|x| items.iter().position(|y| y == x).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        prop_assert_eq!(positions, sorted);
    }

    #[test]
    fn timeline_covers_every_day_once(commits in prop::collection::vec(commit(), 1..60)) {
        let timeline = commit_timeline(&commits).unwrap();

        let dates: Vec<NaiveDate> = commits.iter().map(|c| c.created_at.date_naive()).collect();
        let min = *dates.iter().min().unwrap();
        let max = *dates.iter().max().unwrap();

        prop_assert_eq!(timeline.len() as i64, (max - min).num_days() + 1);
        prop_assert_eq!(timeline.first().unwrap().date, min);
        prop_assert_eq!(timeline.last().unwrap().date, max);
        for pair in timeline.windows(2) {
            prop_assert_eq!(pair[0].date.succ_opt().unwrap(), pair[1].date);
        }
        for day in &timeline {
            let expected = dates.iter().filter(|d| **d == day.date).count();
            prop_assert_eq!(day.count, expected);
        }
    }

    #[test]
    fn distributions_sum_to_commit_count(commits in prop::collection::vec(commit(), 0..60)) {
        let apps: usize = source_application_distribution(&commits).iter().map(|s| s.count).sum();
        let authors: usize = author_distribution(&commits).iter().map(|s| s.count).sum();
        prop_assert_eq!(apps, commits.len());
        prop_assert_eq!(authors, commits.len());
    }

    #[test]
    fn bullet_list_has_one_line_per_item(items in prop::collection::vec("[a-zA-Z ]{0,12}", 0..20)) {
        let md = to_bullet_list(&items);
        prop_assert_eq!(md.lines().count(), items.len());
        prop_assert!(md.lines().all(|l| l.starts_with("- ") && l.ends_with(' ')));
    }
}

// ---------------------------------------------------------------------------
// Worked examples
// ---------------------------------------------------------------------------

fn at(date: &str) -> Commit {
    Commit {
        id: date.to_string(),
        author_name: "Ada".to_string(),
        source_application: "Rhino".to_string(),
        created_at: DateTime::parse_from_rfc3339(&format!("{date}T12:00:00Z"))
            .unwrap()
            .with_timezone(&Utc),
        message: None,
        branch_name: None,
    }
}

#[test]
fn timeline_example_fills_the_gap() {
    let commits = vec![at("2023-01-01"), at("2023-01-01"), at("2023-01-03")];
    let timeline = commit_timeline(&commits).unwrap();
    let pairs: Vec<(String, usize)> = timeline
        .iter()
        .map(|d| (d.date.format("%m-%d").to_string(), d.count))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("01-01".to_string(), 2),
            ("01-02".to_string(), 0),
            ("01-03".to_string(), 1),
        ]
    );
}

#[test]
fn application_example_counts_in_first_seen_order() {
    let mut commits = vec![at("2023-01-01"), at("2023-01-02"), at("2023-01-03")];
    commits[2].source_application = "Revit".to_string();
    let dist: Vec<(String, usize)> = source_application_distribution(&commits)
        .into_iter()
        .map(|s| (s.label, s.count))
        .collect();
    assert_eq!(dist, vec![("Rhino".to_string(), 2), ("Revit".to_string(), 1)]);
}

#[test]
fn bullet_list_examples() {
    let empty: Vec<String> = Vec::new();
    assert_eq!(to_bullet_list(&empty), "");
    assert_eq!(to_bullet_list(&["a", "b"]), "- a \n- b \n");
}
