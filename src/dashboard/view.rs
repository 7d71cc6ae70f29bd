/// Dashboard view model: every section of a loaded page, built from fetched
/// entities by the aggregation functions.
use serde::Serialize;

use crate::analytics::aggregate::{self, BranchCommitCount, DailyCount, Distinct, Share};
use crate::config::schema::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::speckle::{Branch, Commit, Stream};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// A fully assembled dashboard for one stream.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub header: Header,
    pub inputs: Inputs,
    pub stream: Stream,
    pub viewer: Viewer,
    pub report: Report,
    pub graphs: Graphs,
}

/// Page titles and the about text.
#[derive(Debug, Clone, Serialize)]
pub struct Header {
    pub tab_title: String,
    pub title: String,
    pub icon: String,
    pub about: String,
}

impl Header {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            tab_title: config.page_title_tab.clone(),
            title: config.page_title_header.clone(),
            icon: config.page_icon.clone(),
            about: config.about.clone(),
        }
    }
}

/// What the user entered, echoed back along with the stream choices.
#[derive(Debug, Clone, Serialize)]
pub struct Inputs {
    pub server: String,
    pub stream_name: String,
    pub stream_names: Vec<String>,
}

/// Embedded viewer showing the latest commit.
#[derive(Debug, Clone, Serialize)]
pub struct Viewer {
    pub commit: Commit,
    pub embed_url: String,
    pub height: u32,
}

/// Headline counts with their markdown bullet lists.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub branch_count: usize,
    pub branch_list: String,
    pub commit_count: usize,
    pub connectors: Distinct<String>,
    pub connector_list: String,
    pub contributors: Distinct<String>,
    pub contributor_list: String,
}

/// Chart data, one table per graph.
#[derive(Debug, Clone, Serialize)]
pub struct Graphs {
    /// Bar chart.
    pub branch_commits: Vec<BranchCommitCount>,
    /// Donut chart.
    pub applications: Vec<Share>,
    /// Donut chart.
    pub authors: Vec<Share>,
    /// Line chart, ascending by date.
    pub timeline: Vec<DailyCount>,
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Everything fetched for one stream during a render pass.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub server: String,
    pub stream: Stream,
    pub stream_names: Vec<String>,
    pub branches: Vec<Branch>,
    /// Most recent first.
    pub commits: Vec<Commit>,
}

/// Assemble every section. Fails on the first aggregation error.
///
/// A stream without commits is [`DashboardError::EmptyData`]: the viewer and
/// the timeline both need at least one.
pub fn build_view(config: &DashboardConfig, fetched: Fetched) -> DashboardResult<DashboardView> {
    let Fetched {
        server,
        stream,
        stream_names,
        branches,
        commits,
    } = fetched;

    let Some(latest) = commits.first().cloned() else {
        return Err(DashboardError::EmptyData(format!(
            "stream '{}' has no commits",
            stream.name
        )));
    };

    let timeline = aggregate::commit_timeline(&commits)?;

    let branch_names: Vec<&str> = branches.iter().map(|b| b.name.as_str()).collect();
    let connectors =
        aggregate::count_distinct(commits.iter().map(|c| c.source_application.clone()));
    let contributors =
        aggregate::count_distinct(stream.collaborators.iter().map(|c| c.name.clone()));

    let report = Report {
        branch_count: stream.branch_count,
        branch_list: aggregate::to_bullet_list(&branch_names),
        commit_count: commits.len(),
        connector_list: aggregate::to_bullet_list(&connectors.items),
        connectors,
        contributor_list: aggregate::to_bullet_list(&contributors.items),
        contributors,
    };

    let graphs = Graphs {
        branch_commits: aggregate::branch_commit_counts(&branches),
        applications: aggregate::source_application_distribution(&commits),
        authors: aggregate::author_distribution(&commits),
        timeline,
    };

    let viewer = Viewer {
        embed_url: aggregate::commit_embed_url(&server, &stream, &latest),
        commit: latest,
        height: config.viewer_height,
    };

    Ok(DashboardView {
        header: Header::from_config(config),
        inputs: Inputs {
            server,
            stream_name: stream.name.clone(),
            stream_names,
        },
        stream,
        viewer,
        report,
        graphs,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speckle::Collaborator;
    use chrono::{DateTime, Utc};

    fn commit(id: &str, author: &str, app: &str, created_at: &str) -> Commit {
        Commit {
            id: id.to_string(),
            author_name: author.to_string(),
            source_application: app.to_string(),
            created_at: DateTime::parse_from_rfc3339(created_at)
                .unwrap()
                .with_timezone(&Utc),
            message: None,
            branch_name: Some("main".to_string()),
        }
    }

    fn collaborator(name: &str) -> Collaborator {
        Collaborator {
            id: None,
            name: name.to_string(),
            role: Some("stream:contributor".to_string()),
        }
    }

    fn fetched(commits: Vec<Commit>) -> Fetched {
        Fetched {
            server: "speckle.xyz".to_string(),
            stream: Stream {
                id: "s1".to_string(),
                name: "Tower".to_string(),
                description: None,
                branch_count: 2,
                collaborators: vec![collaborator("Ada"), collaborator("Linus"), collaborator("Ada")],
                created_at: None,
                updated_at: None,
            },
            stream_names: vec!["Tower".to_string(), "Bridge".to_string()],
            branches: vec![
                Branch {
                    name: "main".to_string(),
                    commit_count: 2,
                    description: None,
                },
                Branch {
                    name: "dev".to_string(),
                    commit_count: 1,
                    description: None,
                },
            ],
            commits,
        }
    }

    #[test]
    fn builds_every_section() {
        let commits = vec![
            commit("c3", "Ada", "Revit", "2023-01-03T08:00:00Z"),
            commit("c2", "Ada", "Rhino", "2023-01-01T18:00:00Z"),
            commit("c1", "Linus", "Rhino", "2023-01-01T09:00:00Z"),
        ];
        let view = build_view(&DashboardConfig::default(), fetched(commits)).unwrap();

        assert_eq!(view.header.title, "Speckle Stream Activity App 📈");
        assert_eq!(view.inputs.stream_name, "Tower");
        assert_eq!(view.inputs.stream_names.len(), 2);

        assert_eq!(view.viewer.commit.id, "c3");
        assert_eq!(
            view.viewer.embed_url,
            "https://speckle.xyz/embed?stream=s1&commit=c3"
        );
        assert_eq!(view.viewer.height, 400);

        assert_eq!(view.report.branch_count, 2);
        assert_eq!(view.report.branch_list, "- main \n- dev \n");
        assert_eq!(view.report.commit_count, 3);
        assert_eq!(view.report.connectors.items, vec!["Revit", "Rhino"]);
        assert_eq!(view.report.connector_list, "- Revit \n- Rhino \n");
        assert_eq!(view.report.contributors.count, 2);

        assert_eq!(view.graphs.branch_commits.len(), 2);
        assert_eq!(view.graphs.applications[0].label, "Revit");
        assert_eq!(view.graphs.authors[0].label, "Ada");
        assert_eq!(view.graphs.authors[0].count, 2);
        assert_eq!(view.graphs.timeline.len(), 3);
    }

    #[test]
    fn branch_count_is_the_server_total() {
        let mut data = fetched(vec![commit("c1", "Ada", "Rhino", "2023-01-01T09:00:00Z")]);
        data.stream.branch_count = 150;
        let view = build_view(&DashboardConfig::default(), data).unwrap();

        assert_eq!(view.report.branch_count, 150);
        assert_eq!(view.graphs.branch_commits.len(), 2);
    }

    #[test]
    fn no_commits_is_empty_data() {
        let err = build_view(&DashboardConfig::default(), fetched(Vec::new())).unwrap_err();
        assert!(matches!(err, DashboardError::EmptyData(_)));
        assert!(err.to_string().contains("Tower"));
    }
}
