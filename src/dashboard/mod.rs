//! Dashboard controller.
//!
//! One render pass turns the user's inputs into a [`DashboardState`]:
//!
//! ```text
//! AwaitingCredentials ──connect──▶ AwaitingStreamSelection ──fetch──▶ Loaded
//! ```
//!
//! Every pass starts from scratch. Any adapter or aggregation error aborts
//! the pass and is returned as-is; no partial dashboard is produced.

pub mod view;

use std::time::Instant;

use serde::Serialize;

use crate::analytics::logger::{self, RenderLogEntry};
use crate::config::ActivityConfig;
use crate::error::DashboardResult;
use crate::speckle::{Account, Connector, Stream, StreamSource};

pub use view::{DashboardView, Fetched, Header};

// ---------------------------------------------------------------------------
// Inputs and states
// ---------------------------------------------------------------------------

/// What the user typed or picked for this pass.
#[derive(Debug, Clone, Default)]
pub struct DashboardInputs {
    /// Server address; empty falls back to `[server] url`.
    pub server: String,
    /// Access token; empty means not yet entered.
    pub token: String,
    /// Selected stream name, if any.
    pub stream_name: Option<String>,
    /// Commit limit override; `None` uses `[server] commit_limit`.
    pub commit_limit: Option<usize>,
}

/// Result of one render pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DashboardState {
    /// No token supplied yet.
    AwaitingCredentials { header: Header },
    /// Connected and streams listed, no stream chosen.
    AwaitingStreamSelection {
        header: Header,
        server: String,
        account: Account,
        streams: Vec<Stream>,
    },
    /// Stream resolved and every section assembled.
    Loaded { view: Box<DashboardView> },
}

impl DashboardState {
    /// Stable name used by the render log and the web API.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingCredentials { .. } => "awaiting_credentials",
            Self::AwaitingStreamSelection { .. } => "awaiting_stream_selection",
            Self::Loaded { .. } => "loaded",
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives render passes against whatever [`Connector`] it is given.
pub struct Dashboard<'a, C> {
    config: &'a ActivityConfig,
    connector: C,
}

impl<'a, C: Connector> Dashboard<'a, C> {
    pub fn new(config: &'a ActivityConfig, connector: C) -> Self {
        Self { config, connector }
    }

    /// Run one render pass and append it to the render log.
    pub fn render(&self, inputs: &DashboardInputs) -> DashboardResult<DashboardState> {
        let started = Instant::now();
        let server = self.resolve_server(inputs);
        let result = self.render_pass(&server, inputs);

        let duration_ms = started.elapsed().as_millis() as u64;
        logger::log_render(
            &self.config.logging,
            &render_log_entry(&server, inputs, &result, duration_ms),
        );

        result
    }

    fn resolve_server(&self, inputs: &DashboardInputs) -> String {
        let server = inputs.server.trim();
        if server.is_empty() {
            self.config.server.url.clone()
        } else {
            server.to_string()
        }
    }

    fn render_pass(&self, server: &str, inputs: &DashboardInputs) -> DashboardResult<DashboardState> {
        let header = Header::from_config(&self.config.dashboard);

        let token = inputs.token.trim();
        if token.is_empty() {
            return Ok(DashboardState::AwaitingCredentials { header });
        }

        let session = self.connector.connect(server, token)?;
        let streams = session.list_streams()?;

        let Some(name) = selected_stream(inputs) else {
            return Ok(DashboardState::AwaitingStreamSelection {
                header,
                server: server.to_string(),
                account: session.account().clone(),
                streams,
            });
        };

        let stream = session.find_stream_by_name(name)?;
        let branches = session.list_branches(&stream.id)?;
        let limit = inputs.commit_limit.unwrap_or(self.config.server.commit_limit);
        let commits = session.list_commits(&stream.id, limit)?;

        let fetched = Fetched {
            server: server.to_string(),
            stream_names: streams.into_iter().map(|s| s.name).collect(),
            stream,
            branches,
            commits,
        };
        let view = view::build_view(&self.config.dashboard, fetched)?;

        Ok(DashboardState::Loaded {
            view: Box::new(view),
        })
    }
}

/// Stream name from the inputs, ignoring blank selections.
fn selected_stream(inputs: &DashboardInputs) -> Option<&str> {
    inputs
        .stream_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Describe a finished pass for the render log. The token is never included.
fn render_log_entry(
    server: &str,
    inputs: &DashboardInputs,
    result: &DashboardResult<DashboardState>,
    duration_ms: u64,
) -> RenderLogEntry {
    match result {
        Ok(state) => {
            let mut entry =
                RenderLogEntry::now(server, selected_stream(inputs), state.name(), duration_ms);
            if let DashboardState::Loaded { view } = state {
                entry.branches = Some(view.report.branch_count);
                entry.commits = Some(view.report.commit_count);
            }
            entry
        }
        Err(err) => {
            let mut entry =
                RenderLogEntry::now(server, selected_stream(inputs), "error", duration_ms);
            entry.error_kind = Some(err.kind().to_string());
            entry.error = Some(err.to_string());
            entry
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;

    #[test]
    fn state_names_match_serialized_tag() {
        let state = DashboardState::AwaitingCredentials {
            header: Header::from_config(&Default::default()),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], state.name());
        assert_eq!(json["header"]["icon"], "📊");
    }

    #[test]
    fn blank_stream_name_is_no_selection() {
        let mut inputs = DashboardInputs::default();
        assert_eq!(selected_stream(&inputs), None);
        inputs.stream_name = Some("   ".to_string());
        assert_eq!(selected_stream(&inputs), None);
        inputs.stream_name = Some(" Tower ".to_string());
        assert_eq!(selected_stream(&inputs), Some("Tower"));
    }

    #[test]
    fn error_log_entry_carries_kind_not_token() {
        let inputs = DashboardInputs {
            server: "speckle.xyz".to_string(),
            token: "secret-token".to_string(),
            stream_name: Some("Tower".to_string()),
            commit_limit: None,
        };
        let result = Err(DashboardError::NotFound("no stream named 'Tower'".to_string()));
        let entry = render_log_entry("speckle.xyz", &inputs, &result, 12);

        assert_eq!(entry.state, "error");
        assert_eq!(entry.error_kind.as_deref(), Some("not_found"));
        assert_eq!(entry.stream.as_deref(), Some("Tower"));
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("secret-token"));
    }
}
