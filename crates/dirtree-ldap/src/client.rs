//! Directory client abstraction
//!
//! A [`DirectoryClient`] opens physical sessions; a [`DirectorySession`]
//! performs reads on one of them. The resilient connection and the tree
//! builders only talk to these traits, so tests can substitute an in-memory
//! directory.

use std::time::Duration;

use async_trait::async_trait;

use dirtree_core::attribute::{RawAttribute, RawEntry};
use dirtree_core::dn::DistinguishedName;
use dirtree_core::error::DirectoryResult;
use dirtree_core::search::SearchScope;

/// Attribute selector requesting every user attribute.
pub const ALL_USER_ATTRIBUTES: &str = "*";

/// How a session authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum BindCredentials {
    /// No bind is performed.
    Anonymous,
    /// Simple bind with a DN and password.
    Simple {
        principal: String,
        credential: String,
    },
}

impl std::fmt::Debug for BindCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindCredentials::Anonymous => f.write_str("Anonymous"),
            BindCredentials::Simple { principal, .. } => f
                .debug_struct("Simple")
                .field("principal", principal)
                .field("credential", &"***REDACTED***")
                .finish(),
        }
    }
}

/// Everything needed to open a session. Fixed for the lifetime of a
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub url: String,
    pub bind: BindCredentials,
    pub connection_timeout: Duration,
    pub read_timeout: Duration,
}

/// Entries returned by a search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub entries: Vec<RawEntry>,
    /// The server stopped early because of a size limit.
    pub size_limit_exceeded: bool,
}

impl SearchResults {
    pub fn new(entries: Vec<RawEntry>) -> Self {
        Self {
            entries,
            size_limit_exceeded: false,
        }
    }

    /// Mark the results as cut short by the server.
    #[must_use]
    pub fn truncated(mut self) -> Self {
        self.size_limit_exceeded = true;
        self
    }
}

/// Opens sessions against a directory server.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Open and authenticate a new session. Failures are fatal connection
    /// errors.
    async fn open(&self, params: &ConnectionParams) -> DirectoryResult<Box<dyn DirectorySession>>;
}

/// One open session. Read timeouts surface as transient errors.
#[async_trait]
pub trait DirectorySession: Send {
    /// Read the requested attributes of the entry at `dn`.
    async fn read_entry(
        &mut self,
        dn: &DistinguishedName,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<RawAttribute>>;

    /// Search below `base`.
    async fn search(
        &mut self,
        base: &DistinguishedName,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<SearchResults>;

    /// Close the session.
    async fn close(&mut self) -> DirectoryResult<()>;
}
