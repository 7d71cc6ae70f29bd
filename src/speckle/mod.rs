//! Connection adapter for the remote Speckle server.
//!
//! A [`Connector`] turns a server address and access token into an
//! authenticated session implementing [`StreamSource`]. The dashboard
//! controller only talks to these two traits, so tests can drive it with an
//! in-memory source while the binary uses [`client::SpeckleConnector`].
//!
//! All accessors return typed entities (see [`types`]); raw payloads never
//! leave this module.

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod test_server;

use crate::error::{DashboardError, DashboardResult};

pub use client::{SpeckleConnector, SpeckleSession};
pub use types::{Account, Branch, Collaborator, Commit, Stream};

/// Default number of commits fetched per stream.
pub const DEFAULT_COMMIT_LIMIT: usize = 100;

/// Read access to the streams of one authenticated account.
pub trait StreamSource {
    /// The account the session is authenticated as.
    fn account(&self) -> &Account;

    /// All streams visible to the account, in server order.
    fn list_streams(&self) -> DashboardResult<Vec<Stream>>;

    /// First stream whose name equals `name`.
    ///
    /// The default implementation filters [`list_streams`](Self::list_streams);
    /// network-backed sources narrow candidates with a server-side search
    /// first.
    fn find_stream_by_name(&self, name: &str) -> DashboardResult<Stream> {
        first_named(self.list_streams()?, name)
    }

    /// Branches of a stream, in server order.
    fn list_branches(&self, stream_id: &str) -> DashboardResult<Vec<Branch>>;

    /// Commits of a stream, most recent first, at most `limit` of them.
    fn list_commits(&self, stream_id: &str, limit: usize) -> DashboardResult<Vec<Commit>>;
}

/// Opens authenticated sessions.
pub trait Connector {
    type Session: StreamSource;

    /// Authenticate against `server` with `token`.
    ///
    /// Fails with [`DashboardError::Auth`] when the token is empty or does
    /// not resolve to an account.
    fn connect(&self, server: &str, token: &str) -> DashboardResult<Self::Session>;
}

/// Pick the first stream named exactly `name`.
pub fn first_named(streams: Vec<Stream>, name: &str) -> DashboardResult<Stream> {
    streams
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| DashboardError::NotFound(format!("no stream named '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(id: &str, name: &str) -> Stream {
        Stream {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            branch_count: 0,
            collaborators: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn first_named_returns_first_match() {
        let streams = vec![stream("1", "Tower"), stream("2", "Bridge"), stream("3", "Bridge")];
        assert_eq!(first_named(streams, "Bridge").unwrap().id, "2");
    }

    #[test]
    fn first_named_is_exact() {
        let streams = vec![stream("1", "Tower B")];
        let err = first_named(streams, "Tower").unwrap_err();
        assert!(matches!(err, DashboardError::NotFound(_)));
    }

    #[test]
    fn first_named_on_empty_list_is_not_found() {
        assert!(matches!(
            first_named(Vec::new(), "Tower"),
            Err(DashboardError::NotFound(_))
        ));
    }
}
