/// GraphQL client for a Speckle server.
///
/// Talks to `POST {base}/graphql` with a bearer token using the synchronous
/// `ureq` HTTP client. One [`SpeckleSession`] is created per render pass and
/// dropped afterwards; nothing is cached between passes.
///
/// Error mapping:
///
/// - **Transport failures** and unexpected HTTP statuses → `Network`
/// - **HTTP 401/403** or GraphQL auth errors → `Auth`
/// - **GraphQL "not found" errors** or a null `stream` → `NotFound`
/// - **Undecodable or incomplete payloads** → `InvalidResponse`
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::types::{
    Account, Branch, Commit, GraphQlError, GraphQlResponse, RawBranch, RawCollection, RawCommit,
    RawStream, RawUser, Stream,
};
use super::{Connector, StreamSource, first_named};
use crate::config::schema::ServerConfig;
use crate::error::{DashboardError, DashboardResult};

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

const STREAM_FIELDS: &str = "id name description createdAt updatedAt \
     collaborators { id name role } branches { totalCount }";

const ACTIVE_USER_QUERY: &str = "query ActiveUser { activeUser { id name email } }";

fn streams_query() -> String {
    format!(
        "query Streams($query: String, $limit: Int!) {{ \
         streams(query: $query, limit: $limit) {{ totalCount items {{ {STREAM_FIELDS} }} }} }}"
    )
}

const BRANCHES_QUERY: &str = "query StreamBranches($id: String!, $limit: Int!) { \
     stream(id: $id) { branches(limit: $limit) { totalCount \
     items { name description commits { totalCount } } } } }";

const COMMITS_QUERY: &str = "query StreamCommits($id: String!, $limit: Int!) { \
     stream(id: $id) { commits(limit: $limit) { totalCount \
     items { id message authorName sourceApplication createdAt branchName } } } }";

// ---------------------------------------------------------------------------
// Response data shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveUserData {
    active_user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct StreamsData {
    streams: Option<RawCollection<RawStream>>,
}

#[derive(Debug, Deserialize)]
struct StreamData<T> {
    stream: Option<T>,
}

#[derive(Debug, Deserialize)]
struct StreamBranches {
    branches: Option<RawCollection<RawBranch>>,
}

#[derive(Debug, Deserialize)]
struct StreamCommits {
    commits: Option<RawCollection<RawCommit>>,
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// GraphQL error messages that mean the token was refused.
static AUTH_ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)unauthori[sz]ed|unauthenticated|forbidden|not authori[sz]ed|(?:auth|access|invalid)\s+token|permission",
    )
    .expect("auth error regex must compile")
});

/// GraphQL error messages that mean the requested entity does not exist.
static NOT_FOUND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)not\s+found|does not exist").expect("not-found regex must compile"));

/// Map a non-empty GraphQL `errors` array to a dashboard error.
///
/// The first error decides the variant; all messages are kept for display.
fn classify_graphql_errors(errors: &[GraphQlError]) -> DashboardError {
    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    let Some(first) = errors.first() else {
        return DashboardError::InvalidResponse("empty error list".to_string());
    };

    let code = first
        .extensions
        .as_ref()
        .and_then(|ext| ext.code.as_deref())
        .unwrap_or("")
        .to_ascii_uppercase();

    if matches!(code.as_str(), "FORBIDDEN" | "UNAUTHENTICATED" | "UNAUTHORIZED")
        || AUTH_ERROR_RE.is_match(&first.message)
    {
        DashboardError::Auth(message)
    } else if code.contains("NOT_FOUND") || NOT_FOUND_RE.is_match(&first.message) {
        DashboardError::NotFound(message)
    } else {
        DashboardError::InvalidResponse(message)
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Normalize a user-supplied server address into a base URL.
///
/// A bare host gets `https://`; an explicit scheme is kept so local
/// `http://` servers work. Trailing slashes are dropped.
pub fn server_base_url(server: &str) -> String {
    let trimmed = server.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Send one GraphQL request and decode its `data`.
fn post_graphql<T: DeserializeOwned>(
    base_url: &str,
    token: &str,
    timeout: Duration,
    query: &str,
    variables: serde_json::Value,
) -> DashboardResult<T> {
    let url = format!("{base_url}/graphql");
    let body = GraphQlRequest { query, variables };

    let resp = match ureq::post(&url)
        .timeout(timeout)
        .set("Authorization", &format!("Bearer {token}"))
        .send_json(&body)
    {
        Ok(resp) => resp,
        Err(ureq::Error::Status(code @ (401 | 403), _)) => {
            return Err(DashboardError::Auth(format!(
                "server rejected the token (HTTP {code})"
            )));
        }
        Err(ureq::Error::Status(code, _)) => {
            return Err(DashboardError::Network(format!("HTTP {code} from {url}")));
        }
        Err(ureq::Error::Transport(transport)) => {
            return Err(DashboardError::Network(transport.to_string()));
        }
    };

    let parsed: GraphQlResponse<T> = resp
        .into_json()
        .map_err(|e| DashboardError::InvalidResponse(format!("undecodable GraphQL response: {e}")))?;

    if !parsed.errors.is_empty() {
        return Err(classify_graphql_errors(&parsed.errors));
    }

    parsed
        .data
        .ok_or_else(|| DashboardError::InvalidResponse("GraphQL response has no data".to_string()))
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Opens [`SpeckleSession`]s with the configured limits and timeout.
#[derive(Debug, Clone)]
pub struct SpeckleConnector {
    timeout: Duration,
    stream_limit: usize,
    branch_limit: usize,
}

impl SpeckleConnector {
    /// Build a connector from the resolved `[server]` config.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            stream_limit: config.stream_limit,
            branch_limit: config.branch_limit,
        }
    }
}

impl Connector for SpeckleConnector {
    type Session = SpeckleSession;

    fn connect(&self, server: &str, token: &str) -> DashboardResult<SpeckleSession> {
        let token = token.trim();
        if token.is_empty() {
            return Err(DashboardError::Auth("no access token supplied".to_string()));
        }

        let base_url = server_base_url(server);
        let data: ActiveUserData =
            post_graphql(&base_url, token, self.timeout, ACTIVE_USER_QUERY, json!({}))?;

        let account = data
            .active_user
            .ok_or_else(|| {
                DashboardError::Auth(format!("token does not resolve to an account on {base_url}"))
            })?
            .into_account()?;

        Ok(SpeckleSession {
            base_url,
            token: token.to_string(),
            timeout: self.timeout,
            stream_limit: self.stream_limit,
            branch_limit: self.branch_limit,
            account,
        })
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An authenticated connection to one server.
pub struct SpeckleSession {
    base_url: String,
    token: String,
    timeout: Duration,
    stream_limit: usize,
    branch_limit: usize,
    account: Account,
}

impl std::fmt::Debug for SpeckleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeckleSession")
            .field("base_url", &self.base_url)
            .field("account", &self.account.name)
            .finish_non_exhaustive()
    }
}

impl SpeckleSession {
    /// Base URL of the server this session talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn query<T: DeserializeOwned>(&self, query: &str, variables: serde_json::Value) -> DashboardResult<T> {
        post_graphql(&self.base_url, &self.token, self.timeout, query, variables)
    }

    fn search_streams(&self, search: Option<&str>) -> DashboardResult<Vec<Stream>> {
        let data: StreamsData = self.query(
            &streams_query(),
            json!({ "query": search, "limit": self.stream_limit }),
        )?;

        data.streams
            .map(|c| c.items)
            .unwrap_or_default()
            .into_iter()
            .map(RawStream::into_stream)
            .collect()
    }

    fn stream_field<T: DeserializeOwned>(
        &self,
        query: &str,
        stream_id: &str,
        limit: usize,
    ) -> DashboardResult<T> {
        let data: StreamData<T> = self.query(query, json!({ "id": stream_id, "limit": limit }))?;
        data.stream
            .ok_or_else(|| DashboardError::NotFound(format!("stream '{stream_id}' does not exist")))
    }
}

impl StreamSource for SpeckleSession {
    fn account(&self) -> &Account {
        &self.account
    }

    fn list_streams(&self) -> DashboardResult<Vec<Stream>> {
        self.search_streams(None)
    }

    fn find_stream_by_name(&self, name: &str) -> DashboardResult<Stream> {
        first_named(self.search_streams(Some(name))?, name)
    }

    fn list_branches(&self, stream_id: &str) -> DashboardResult<Vec<Branch>> {
        let data: StreamBranches = self.stream_field(BRANCHES_QUERY, stream_id, self.branch_limit)?;
        data.branches
            .map(|c| c.items)
            .unwrap_or_default()
            .into_iter()
            .map(RawBranch::into_branch)
            .collect()
    }

    fn list_commits(&self, stream_id: &str, limit: usize) -> DashboardResult<Vec<Commit>> {
        let data: StreamCommits = self.stream_field(COMMITS_QUERY, stream_id, limit)?;
        let mut commits = data
            .commits
            .map(|c| c.items)
            .unwrap_or_default()
            .into_iter()
            .map(RawCommit::into_commit)
            .collect::<DashboardResult<Vec<_>>>()?;

        // Newest first, whatever order the server used.
        commits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        commits.truncate(limit);
        Ok(commits)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
