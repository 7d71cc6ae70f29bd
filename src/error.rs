//! Error taxonomy for a dashboard render pass.
//!
//! Every failure that can abort a render pass maps to exactly one variant.
//! Application plumbing (config files, stdout, the web server socket) keeps
//! using `anyhow`; these errors are the ones a user is expected to act on.

use thiserror::Error;

/// Errors surfaced by the connection adapter, the aggregation functions and
/// the dashboard controller.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Missing, rejected or unresolvable access token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// No stream matches the selection.
    #[error("not found: {0}")]
    NotFound(String),

    /// Aggregation attempted on an empty commit or branch set.
    #[error("no data: {0}")]
    EmptyData(String),

    /// Transport failure talking to the remote server.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered, but the payload failed validation.
    #[error("invalid response from server: {0}")]
    InvalidResponse(String),
}

impl DashboardError {
    /// Stable machine-readable name of the variant.
    ///
    /// Used as the `kind` field of web API errors and render-log entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::NotFound(_) => "not_found",
            Self::EmptyData(_) => "empty_data",
            Self::Network(_) => "network",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Result alias for render-pass operations.
pub type DashboardResult<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(DashboardError::Auth("x".into()).kind(), "auth");
        assert_eq!(DashboardError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(DashboardError::EmptyData("x".into()).kind(), "empty_data");
        assert_eq!(DashboardError::Network("x".into()).kind(), "network");
        assert_eq!(
            DashboardError::InvalidResponse("x".into()).kind(),
            "invalid_response"
        );
    }

    #[test]
    fn display_includes_detail() {
        let err = DashboardError::NotFound("no stream named 'Tower'".into());
        assert_eq!(err.to_string(), "not found: no stream named 'Tower'");
    }
}
