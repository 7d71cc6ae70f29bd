//! JSON API handlers for the web dashboard.
//!
//! Each handler corresponds to an API endpoint and returns a
//! `Response<Cursor<Vec<u8>>>` with JSON content. Errors are returned to the
//! router, which maps them to a status code.

use std::io::Cursor;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiny_http::{Response, StatusCode};

use crate::analytics::{logger, reporter};
use crate::config::{self, ActivityConfig};
use crate::dashboard::{Dashboard, DashboardInputs, DashboardState};
use crate::speckle::client::server_base_url;
use crate::speckle::{Connector, SpeckleConnector};

use super::content_type_json;

/// The request itself is unusable (HTTP 400).
#[derive(Debug, Error)]
#[error("bad request: {0}")]
pub struct BadRequest(pub String);

/// The request came from a page other than the dashboard (HTTP 403).
#[derive(Debug, Error)]
#[error("forbidden: {0}")]
pub struct Forbidden(pub String);

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /api/render`.
///
/// A blank `server` falls back to `[server] url`. A blank `token` falls back
/// to `[server] token` only when the request targets the configured server;
/// the configured token is never sent anywhere else.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RenderRequest {
    server: String,
    token: String,
    stream: Option<String>,
    commit_limit: Option<usize>,
}

impl RenderRequest {
    fn into_inputs(self, config: &ActivityConfig) -> DashboardInputs {
        let server = if self.server.trim().is_empty() {
            config.server.url.clone()
        } else {
            self.server
        };
        let token = if !self.token.trim().is_empty() {
            self.token
        } else if server_base_url(&server) == server_base_url(&config.server.url) {
            config.server.token.clone()
        } else {
            String::new()
        };
        DashboardInputs {
            server,
            token,
            stream_name: self.stream,
            commit_limit: self.commit_limit,
        }
    }
}

/// Config API response: effective config (token masked) and built-in defaults.
#[derive(Serialize)]
struct ConfigResponse {
    config: ActivityConfig,
    defaults: ActivityConfig,
    has_token: bool,
    toml_text: String,
}

/// Health API response.
#[derive(Serialize)]
struct HealthResponse {
    server: String,
    has_token: bool,
    global_config_exists: bool,
    project_config_exists: bool,
    log_enabled: bool,
    log_exists: bool,
    log_entries: usize,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a JSON success response.
fn json_response<T: Serialize>(data: &T) -> Result<Response<Cursor<Vec<u8>>>> {
    let body = serde_json::to_string(data).context("failed to serialize JSON response")?;
    Ok(Response::from_data(body.into_bytes())
        .with_header(content_type_json())
        .with_status_code(StatusCode(200)))
}

/// Parse the `?days=N` query parameter from a URL.
fn parse_days_param(url: &str) -> Option<u32> {
    url.split('?').nth(1)?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k == "days" { v.parse().ok() } else { None }
    })
}

fn file_exists(path: Option<std::path::PathBuf>) -> bool {
    path.map(|p| p.exists()).unwrap_or(false)
}

// ---------------------------------------------------------------------------
// API Handlers
// ---------------------------------------------------------------------------

/// `POST /api/render`: run one render pass with the request's credentials.
pub fn post_render(config: &ActivityConfig, body: &str) -> Result<Response<Cursor<Vec<u8>>>> {
    let state = render_with(config, SpeckleConnector::from_config(&config.server), body)?;
    json_response(&state)
}

fn render_with<C: Connector>(
    config: &ActivityConfig,
    connector: C,
    body: &str,
) -> Result<DashboardState> {
    let req: RenderRequest = if body.trim().is_empty() {
        RenderRequest::default()
    } else {
        serde_json::from_str(body).map_err(|e| BadRequest(format!("invalid render request: {e}")))?
    };

    Ok(Dashboard::new(config, connector).render(&req.into_inputs(config))?)
}

/// `GET /api/config`: current effective configuration, token redacted.
pub fn get_config(config: &ActivityConfig) -> Result<Response<Cursor<Vec<u8>>>> {
    json_response(&config_response(config)?)
}

fn config_response(config: &ActivityConfig) -> Result<ConfigResponse> {
    Ok(ConfigResponse {
        config: config.redacted(),
        defaults: ActivityConfig::default(),
        has_token: config.has_token(),
        toml_text: config::show_effective_config(config)?,
    })
}

/// `GET /api/health`: token, config files and render log status.
pub fn get_health(config: &ActivityConfig) -> Result<Response<Cursor<Vec<u8>>>> {
    let log_path = logger::render_log_path(&config.logging);
    let log_entries = log_path
        .as_deref()
        .map(|p| logger::read_all_entries(p).len())
        .unwrap_or(0);

    let resp = HealthResponse {
        server: config.server.url.clone(),
        has_token: config.has_token(),
        global_config_exists: file_exists(config::global_config_file()),
        project_config_exists: file_exists(config::project_config_file()),
        log_enabled: config.logging.enabled,
        log_exists: file_exists(log_path),
        log_entries,
    };

    json_response(&resp)
}

/// `GET /api/history?days=N`: render passes aggregated per day.
pub fn get_history(config: &ActivityConfig, url: &str) -> Result<Response<Cursor<Vec<u8>>>> {
    json_response(&history_for(config, url)?)
}

fn history_for(config: &ActivityConfig, url: &str) -> Result<reporter::History> {
    let path = logger::render_log_path(&config.logging)
        .context("could not resolve render log path")?;
    Ok(reporter::compute_history(&path, parse_days_param(url)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DashboardError, DashboardResult};
    use crate::speckle::test_server::{TestServer, active_user_reply};
    use crate::speckle::{Account, Branch, Commit, Stream, StreamSource};

    /// Connector whose server is always down.
    struct Unreachable;

    impl Connector for Unreachable {
        type Session = NoStreams;

        fn connect(&self, _server: &str, _token: &str) -> DashboardResult<NoStreams> {
            Err(DashboardError::Network("connection refused".into()))
        }
    }

    struct NoStreams(Account);

    impl StreamSource for NoStreams {
        fn account(&self) -> &Account {
            &self.0
        }
        fn list_streams(&self) -> DashboardResult<Vec<Stream>> {
            Ok(Vec::new())
        }
        fn list_branches(&self, _stream_id: &str) -> DashboardResult<Vec<Branch>> {
            Ok(Vec::new())
        }
        fn list_commits(&self, _stream_id: &str, _limit: usize) -> DashboardResult<Vec<Commit>> {
            Ok(Vec::new())
        }
    }

    fn quiet_config() -> ActivityConfig {
        let mut config = ActivityConfig::default();
        config.logging.enabled = false;
        config
    }

    #[test]
    fn parse_days_param_extracts_value() {
        assert_eq!(parse_days_param("/api/history?days=7"), Some(7));
        assert_eq!(parse_days_param("/api/history?foo=bar&days=14"), Some(14));
        assert_eq!(parse_days_param("/api/history"), None);
        assert_eq!(parse_days_param("/api/history?days=abc"), None);
    }

    #[test]
    fn render_request_defaults_from_config() {
        let mut config = quiet_config();
        config.server.token = "configured".to_string();

        let req: RenderRequest = serde_json::from_str(r#"{"stream": "Tower"}"#).unwrap();
        let inputs = req.into_inputs(&config);
        assert_eq!(inputs.server, "speckle.xyz");
        assert_eq!(inputs.token, "configured");
        assert_eq!(inputs.stream_name.as_deref(), Some("Tower"));
        assert_eq!(inputs.commit_limit, None);
    }

    #[test]
    fn render_request_prefers_explicit_values() {
        let config = quiet_config();
        let req: RenderRequest = serde_json::from_str(
            r#"{"server": "http://localhost:3000", "token": "t", "commit_limit": 10}"#,
        )
        .unwrap();
        let inputs = req.into_inputs(&config);
        assert_eq!(inputs.server, "http://localhost:3000");
        assert_eq!(inputs.token, "t");
        assert_eq!(inputs.commit_limit, Some(10));
    }

    #[test]
    fn configured_token_stays_with_configured_server() {
        let mut config = quiet_config();
        config.server.token = "configured".to_string();

        let req: RenderRequest =
            serde_json::from_str(r#"{"server": "https://elsewhere.example", "token": ""}"#).unwrap();
        let inputs = req.into_inputs(&config);
        assert_eq!(inputs.server, "https://elsewhere.example");
        assert_eq!(inputs.token, "");

        let req: RenderRequest =
            serde_json::from_str(r#"{"server": "https://speckle.xyz/", "token": ""}"#).unwrap();
        assert_eq!(req.into_inputs(&config).token, "configured");
    }

    #[test]
    fn foreign_server_never_receives_configured_token() {
        let mut config = quiet_config();
        config.server.token = "configured-secret".to_string();
        let server = TestServer::start(vec![active_user_reply()]);

        let body = format!(r#"{{"server": "{}", "token": ""}}"#, server.url);
        let connector = SpeckleConnector::from_config(&config.server);
        let state = render_with(&config, connector, &body).unwrap();
        let seen = server.finish();

        assert!(matches!(state, DashboardState::AwaitingCredentials { .. }));
        assert!(seen.is_empty());
    }

    #[test]
    fn configured_server_receives_configured_token() {
        let mut config = quiet_config();
        config.server.token = "configured-secret".to_string();
        let server = TestServer::start(vec![
            active_user_reply(),
            (200, r#"{"data": {"streams": {"totalCount": 0, "items": []}}}"#.to_string()),
        ]);
        config.server.url = server.url.clone();

        let connector = SpeckleConnector::from_config(&config.server);
        let state = render_with(&config, connector, r#"{"token": ""}"#).unwrap();
        let seen = server.finish();

        assert!(matches!(state, DashboardState::AwaitingStreamSelection { .. }));
        assert_eq!(
            seen[0].authorization.as_deref(),
            Some("Bearer configured-secret")
        );
    }

    #[test]
    fn empty_body_awaits_credentials_without_connecting() {
        let state = render_with(&quiet_config(), Unreachable, "").unwrap();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "awaiting_credentials");
        assert_eq!(json["header"]["tab_title"], "Speckle Stream Activity");
    }

    #[test]
    fn connector_errors_propagate() {
        let err = render_with(&quiet_config(), Unreachable, r#"{"token": "t"}"#).unwrap_err();
        assert!(err.downcast_ref::<DashboardError>().is_some());
    }

    #[test]
    fn malformed_body_is_bad_request() {
        let err = render_with(&quiet_config(), Unreachable, "[1, 2").unwrap_err();
        assert!(err.downcast_ref::<BadRequest>().is_some());
    }

    #[test]
    fn config_response_redacts_token() {
        let mut config = quiet_config();
        config.server.token = "secret-token".to_string();
        let json = serde_json::to_value(config_response(&config).unwrap()).unwrap();

        assert_eq!(json["has_token"], true);
        assert_eq!(json["config"]["server"]["token"], config::schema::REDACTED);
        assert!(!json.to_string().contains("secret-token"));
        assert_eq!(json["defaults"]["web"]["addr"], "127.0.0.1:8501");
    }

    #[test]
    fn history_reads_configured_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = quiet_config();
        config.logging.path = dir.path().join("render-log.jsonl").to_string_lossy().into_owned();

        let history = history_for(&config, "/api/history?days=7").unwrap();
        assert_eq!(history.total_renders, 0);
        assert!(get_history(&config, "/api/history").is_ok());
    }
}
