//! Typed entities returned by the connection adapter, and the raw GraphQL
//! payload shapes they are validated from.
//!
//! The server's JSON is decoded into the `Raw*` structs (every field
//! optional), then converted into the domain entities. Conversion is the only
//! place a payload can be rejected for missing data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, DashboardResult};

/// Placeholder used when the server omits an author or source application.
pub const UNKNOWN: &str = "unknown";

// ---------------------------------------------------------------------------
// Domain entities
// ---------------------------------------------------------------------------

/// The account a token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// A named project container of versioned model data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stream {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Server-side total of branches in the stream.
    pub branch_count: usize,
    pub collaborators: Vec<Collaborator>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A named line of commits within a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub name: String,
    pub commit_count: usize,
    pub description: Option<String>,
}

/// A single versioned snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub id: String,
    pub author_name: String,
    pub source_application: String,
    pub created_at: DateTime<Utc>,
    pub message: Option<String>,
    pub branch_name: Option<String>,
}

/// A user with access to a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collaborator {
    pub id: Option<String>,
    pub name: String,
    pub role: Option<String>,
}

// ---------------------------------------------------------------------------
// GraphQL envelope
// ---------------------------------------------------------------------------

/// Top-level GraphQL response: `data` and/or `errors`.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtensions>,
}

/// Optional `extensions` block; Speckle puts an error code here.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlErrorExtensions {
    pub code: Option<String>,
}

/// Paginated collection as returned by `streams`, `branches`, `commits`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCollection<T> {
    #[serde(default)]
    pub total_count: Option<usize>,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

// ---------------------------------------------------------------------------
// Raw payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RawUser {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStream {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub collaborators: Option<Vec<RawCollaborator>>,
    #[serde(default)]
    pub branches: Option<RawCollection<RawBranch>>,
}

#[derive(Debug, Deserialize)]
pub struct RawCollaborator {
    pub id: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawBranch {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub commits: Option<RawCollection<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommit {
    pub id: Option<String>,
    pub author_name: Option<String>,
    pub source_application: Option<String>,
    pub created_at: Option<String>,
    pub message: Option<String>,
    pub branch_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn required(value: Option<String>, what: &str) -> DashboardResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DashboardError::InvalidResponse(format!("missing {what}"))),
    }
}

fn or_unknown(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNKNOWN.to_string(),
    }
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> DashboardResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DashboardError::InvalidResponse(format!("bad timestamp '{raw}': {e}")))
}

fn optional_timestamp(raw: Option<String>) -> DashboardResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

impl RawUser {
    pub fn into_account(self) -> DashboardResult<Account> {
        Ok(Account {
            id: required(self.id, "user id")?,
            name: or_unknown(self.name),
            email: self.email,
        })
    }
}

impl RawStream {
    pub fn into_stream(self) -> DashboardResult<Stream> {
        let collaborators = self
            .collaborators
            .unwrap_or_default()
            .into_iter()
            .map(RawCollaborator::into_collaborator)
            .collect::<DashboardResult<Vec<_>>>()?;

        let branch_count = self
            .branches
            .map(|b| b.total_count.unwrap_or(b.items.len()))
            .unwrap_or(0);

        Ok(Stream {
            id: required(self.id, "stream id")?,
            name: required(self.name, "stream name")?,
            description: self.description,
            branch_count,
            collaborators,
            created_at: optional_timestamp(self.created_at)?,
            updated_at: optional_timestamp(self.updated_at)?,
        })
    }
}

impl RawCollaborator {
    pub fn into_collaborator(self) -> DashboardResult<Collaborator> {
        Ok(Collaborator {
            id: self.id,
            name: required(self.name, "collaborator name")?,
            role: self.role,
        })
    }
}

impl RawBranch {
    pub fn into_branch(self) -> DashboardResult<Branch> {
        let commit_count = self
            .commits
            .map(|c| c.total_count.unwrap_or(c.items.len()))
            .unwrap_or(0);

        Ok(Branch {
            name: required(self.name, "branch name")?,
            commit_count,
            description: self.description,
        })
    }
}

impl RawCommit {
    pub fn into_commit(self) -> DashboardResult<Commit> {
        let created_at = required(self.created_at, "commit createdAt")?;
        Ok(Commit {
            id: required(self.id, "commit id")?,
            author_name: or_unknown(self.author_name),
            source_application: or_unknown(self.source_application),
            created_at: parse_timestamp(&created_at)?,
            message: self.message,
            branch_name: self.branch_name,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_payload_converts() {
        let json = r#"{
            "id": "a1b2c3",
            "name": "Tower",
            "description": null,
            "createdAt": "2023-01-01T09:30:00.000Z",
            "updatedAt": "2023-02-01T09:30:00Z",
            "collaborators": [
                {"id": "u1", "name": "Ada", "role": "stream:owner"},
                {"id": "u2", "name": "Linus", "role": "stream:contributor"}
            ],
            "branches": {"totalCount": 4}
        }"#;
        let raw: RawStream = serde_json::from_str(json).unwrap();
        let stream = raw.into_stream().unwrap();

        assert_eq!(stream.id, "a1b2c3");
        assert_eq!(stream.branch_count, 4);
        assert_eq!(stream.collaborators.len(), 2);
        assert_eq!(stream.collaborators[0].name, "Ada");
        assert_eq!(
            stream.created_at.unwrap().to_rfc3339(),
            "2023-01-01T09:30:00+00:00"
        );
    }

    #[test]
    fn stream_without_name_is_rejected() {
        let raw: RawStream = serde_json::from_str(r#"{"id": "a1"}"#).unwrap();
        let err = raw.into_stream().unwrap_err();
        assert!(matches!(err, DashboardError::InvalidResponse(_)));
    }

    #[test]
    fn branch_commit_count_falls_back_to_items() {
        let json = r#"{"name": "main", "commits": {"items": [{}, {}, {}]}}"#;
        let raw: RawBranch = serde_json::from_str(json).unwrap();
        assert_eq!(raw.into_branch().unwrap().commit_count, 3);
    }

    #[test]
    fn commit_missing_app_and_author_become_unknown() {
        let json = r#"{"id": "c1", "createdAt": "2023-01-03T23:59:59+00:00"}"#;
        let raw: RawCommit = serde_json::from_str(json).unwrap();
        let commit = raw.into_commit().unwrap();
        assert_eq!(commit.author_name, UNKNOWN);
        assert_eq!(commit.source_application, UNKNOWN);
    }

    #[test]
    fn commit_timestamp_is_normalized_to_utc() {
        let json = r#"{"id": "c1", "createdAt": "2023-01-03T23:30:00-02:00"}"#;
        let raw: RawCommit = serde_json::from_str(json).unwrap();
        let commit = raw.into_commit().unwrap();
        assert_eq!(commit.created_at.date_naive().to_string(), "2023-01-04");
    }

    #[test]
    fn commit_with_bad_timestamp_is_rejected() {
        let json = r#"{"id": "c1", "createdAt": "yesterday"}"#;
        let raw: RawCommit = serde_json::from_str(json).unwrap();
        assert!(matches!(
            raw.into_commit(),
            Err(DashboardError::InvalidResponse(_))
        ));
    }

    #[test]
    fn graphql_envelope_with_errors_deserializes() {
        let json = r#"{
            "data": null,
            "errors": [{"message": "You must provide an auth token", "extensions": {"code": "FORBIDDEN"}}]
        }"#;
        let resp: GraphQlResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert!(resp.data.is_none());
        assert_eq!(resp.errors.len(), 1);
        assert_eq!(
            resp.errors[0].extensions.as_ref().unwrap().code.as_deref(),
            Some("FORBIDDEN")
        );
    }
}
