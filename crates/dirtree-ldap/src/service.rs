//! Directory service
//!
//! Read operations and tree materialization on top of a
//! [`ResilientConnection`]. Every public operation runs one
//! connect / operate / disconnect cycle; a transient failure marks the
//! connection for reconnect and the operation is re-run on a fresh session
//! until it succeeds or the reconnect ceiling is reached.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use dirtree_core::attribute::{AttributeRecord, RawValue};
use dirtree_core::config::TreeSettings;
use dirtree_core::dn::{DistinguishedName, IntoDn};
use dirtree_core::error::{DirectoryError, DirectoryResult};
use dirtree_core::hierarchy::Hierarchy;
use dirtree_core::node::DirectoryNode;
use dirtree_core::search::{validate_filter, SearchScope, ALL_OBJECTS_FILTER};

use crate::client::{DirectoryClient, DirectorySession, SearchResults, ALL_USER_ATTRIBUTES};
use crate::config::LdapConfig;
use crate::connection::ResilientConnection;
use crate::marshal::{marshal_attributes, marshal_entries};
use crate::session::Ldap3Client;

/// Root DSE attribute listing the top entries of the directory.
pub const NAMING_CONTEXTS: &str = "namingContexts";

/// Future returned by an operation run against a borrowed session.
pub(crate) type SessionFuture<'s, T> =
    Pin<Box<dyn Future<Output = DirectoryResult<T>> + Send + 's>>;

/// Reads a directory and materializes parts of it as trees.
#[derive(Debug)]
pub struct DirectoryService {
    connection: ResilientConnection,
    tree: TreeSettings,
}

impl DirectoryService {
    /// Connect to an LDAP server.
    pub async fn connect(config: &LdapConfig) -> DirectoryResult<Self> {
        Self::with_client(Arc::new(Ldap3Client::new()), config).await
    }

    /// Connect through the given client.
    pub async fn with_client(
        client: Arc<dyn DirectoryClient>,
        config: &LdapConfig,
    ) -> DirectoryResult<Self> {
        let connection = ResilientConnection::new(client, config).await?;
        Ok(Self::new(connection, config.tree.clone()))
    }

    pub fn new(connection: ResilientConnection, tree: TreeSettings) -> Self {
        Self { connection, tree }
    }

    pub fn connection(&self) -> &ResilientConnection {
        &self.connection
    }

    pub fn tree_settings(&self) -> &TreeSettings {
        &self.tree
    }

    /// Run `op` against an open session, reconnecting and re-running it
    /// after transient failures. The session is closed afterwards whatever
    /// the outcome. When both the operation and the close fail, the
    /// operation's error wins and the close failure is logged.
    pub(crate) async fn with_session<T, F>(&mut self, operation: &str, mut op: F) -> DirectoryResult<T>
    where
        T: Send,
        F: for<'s> FnMut(&'s mut dyn DirectorySession) -> SessionFuture<'s, T>,
    {
        let result = self.retry(operation, &mut op).await;
        let closed = self.connection.disconnect().await;

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(operation, error = %close_err, "Failed to close session after error");
                Err(err)
            }
        }
    }

    async fn retry<T, F>(&mut self, operation: &str, op: &mut F) -> DirectoryResult<T>
    where
        T: Send,
        F: for<'s> FnMut(&'s mut dyn DirectorySession) -> SessionFuture<'s, T>,
    {
        loop {
            let session = self.connection.connect().await?;
            let outcome = op(session).await;
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    warn!(
                        operation,
                        attempts = self.connection.reconnect_attempts(),
                        error = %err,
                        "Transient directory error, reconnecting"
                    );
                    self.connection.mark_for_reconnect();
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn search_raw(
        &mut self,
        operation: &str,
        base: &DistinguishedName,
        filter: &str,
        scope: SearchScope,
    ) -> DirectoryResult<SearchResults> {
        validate_filter(filter)?;

        let base = base.clone();
        let filter = filter.to_string();
        let results = self
            .with_session(operation, move |session| {
                let base = base.clone();
                let filter = filter.clone();
                Box::pin(async move {
                    session
                        .search(&base, scope, &filter, &[ALL_USER_ATTRIBUTES])
                        .await
                })
            })
            .await?;

        debug!(
            operation,
            entries = results.entries.len(),
            truncated = results.size_limit_exceeded,
            "Search complete"
        );
        Ok(results)
    }

    /// String values of one attribute of one entry. A missing attribute
    /// yields no values.
    pub(crate) async fn read_strings(
        &mut self,
        operation: &str,
        dn: &DistinguishedName,
        attribute: &'static str,
    ) -> DirectoryResult<Vec<String>> {
        let dn = dn.clone();
        let raw = self
            .with_session(operation, move |session| {
                let dn = dn.clone();
                Box::pin(async move { session.read_entry(&dn, &[attribute]).await })
            })
            .await?;

        Ok(raw
            .into_iter()
            .filter(|a| a.name.eq_ignore_ascii_case(attribute))
            .flat_map(|a| a.values)
            .filter_map(|value| match value {
                RawValue::Text(s) => Some(s),
                _ => None,
            })
            .collect())
    }

    /// All user attributes of the entry at `dn`.
    #[instrument(skip(self, dn))]
    pub async fn get_attributes(&mut self, dn: impl IntoDn) -> DirectoryResult<AttributeRecord> {
        let dn = dn.into_dn()?;
        let target = dn.clone();
        let raw = self
            .with_session("get_attributes", move |session| {
                let dn = target.clone();
                Box::pin(async move { session.read_entry(&dn, &[ALL_USER_ATTRIBUTES]).await })
            })
            .await?;

        let record = marshal_attributes(raw);
        debug!(dn = %dn, attributes = record.len(), "Read entry");
        Ok(record)
    }

    /// The entry at `dn` as a node.
    pub async fn get_node(&mut self, dn: impl IntoDn) -> DirectoryResult<DirectoryNode> {
        let dn = dn.into_dn()?;
        let attributes = self.get_attributes(&dn).await?;
        DirectoryNode::new(dn, attributes)
    }

    /// Immediate children of `dn`.
    #[instrument(skip(self, dn))]
    pub async fn get_children(&mut self, dn: impl IntoDn) -> DirectoryResult<Vec<DirectoryNode>> {
        let dn = dn.into_dn()?;
        let results = self
            .search_raw("get_children", &dn, ALL_OBJECTS_FILTER, SearchScope::OneLevel)
            .await?;
        if results.size_limit_exceeded {
            warn!(dn = %dn, "Child listing truncated by the server size limit");
        }
        marshal_entries(results.entries)
    }

    /// DNs of the top entries listed by the root DSE.
    pub async fn naming_contexts(&mut self) -> DirectoryResult<Vec<DistinguishedName>> {
        self.read_strings("naming_contexts", &DistinguishedName::empty(), NAMING_CONTEXTS)
            .await?
            .iter()
            .map(|dn| DistinguishedName::parse(dn))
            .collect()
    }

    /// The top entries of the directory.
    #[instrument(skip(self))]
    pub async fn get_roots(&mut self) -> DirectoryResult<Vec<DirectoryNode>> {
        let contexts = self.naming_contexts().await?;
        if contexts.is_empty() {
            warn!("Root DSE lists no naming contexts");
        }

        let mut roots = Vec::with_capacity(contexts.len());
        for dn in contexts {
            roots.push(self.get_node(dn).await?);
        }
        Ok(roots)
    }

    /// Search below `dn` with a raw filter string.
    #[instrument(skip(self, dn))]
    pub async fn search(
        &mut self,
        dn: impl IntoDn,
        filter: &str,
        scope: SearchScope,
    ) -> DirectoryResult<Vec<DirectoryNode>> {
        let dn = dn.into_dn()?;
        let results = self.search_raw("search", &dn, filter, scope).await?;
        if results.size_limit_exceeded {
            warn!(dn = %dn, filter, "Search results truncated by the server size limit");
        }
        marshal_entries(results.entries)
    }

    /// Search the immediate children of `dn`.
    pub async fn search_one_level(
        &mut self,
        dn: impl IntoDn,
        filter: &str,
    ) -> DirectoryResult<Vec<DirectoryNode>> {
        self.search(dn, filter, SearchScope::OneLevel).await
    }

    /// Search `dn` and everything below it.
    pub async fn search_subtree(
        &mut self,
        dn: impl IntoDn,
        filter: &str,
    ) -> DirectoryResult<Vec<DirectoryNode>> {
        self.search(dn, filter, SearchScope::Subtree).await
    }

    /// Materialize the tree rooted at `dn` from one subtree search, with
    /// every level sorted by DN.
    ///
    /// If the search comes back truncated, or with at least
    /// `fast_threshold` entries, the result is assumed incomplete and the
    /// tree is built level by level instead.
    #[instrument(skip(self, dn))]
    pub async fn build_tree_fast(
        &mut self,
        dn: impl IntoDn,
    ) -> DirectoryResult<Hierarchy<DirectoryNode>> {
        let dn = dn.into_dn()?;
        let results = self
            .search_raw("build_tree_fast", &dn, ALL_OBJECTS_FILTER, SearchScope::Subtree)
            .await?;

        if results.entries.is_empty() {
            return Err(DirectoryError::invariant(format!(
                "subtree search under '{dn}' returned no entries"
            )));
        }

        let count = results.entries.len();
        if results.size_limit_exceeded || count >= self.tree.fast_threshold {
            info!(
                dn = %dn,
                entries = count,
                threshold = self.tree.fast_threshold,
                truncated = results.size_limit_exceeded,
                "Subtree search may be incomplete, building tree level by level"
            );
            return self.build_tree_slow(dn).await;
        }

        let nodes = marshal_entries(results.entries)?;
        let mut roots = Hierarchy::link_by_predicate(nodes, DirectoryNode::is_parent_of);
        let root_count = roots.len();
        let mut tree = match (roots.pop(), root_count) {
            (Some(tree), 1) => tree,
            _ => {
                return Err(DirectoryError::invariant(format!(
                    "subtree under '{dn}' linked into {root_count} roots, expected exactly one"
                )))
            }
        };

        tree.sort_recursive_by(|a, b| a.dn().cmp(b.dn()));
        debug!(dn = %dn, nodes = tree.size(), "Built tree from one search");
        Ok(tree)
    }

    /// Materialize the tree rooted at `dn` with one child listing per
    /// entry. Slower than [`build_tree_fast`](Self::build_tree_fast) but
    /// not subject to search size limits.
    #[instrument(skip(self, dn))]
    pub async fn build_tree_slow(
        &mut self,
        dn: impl IntoDn,
    ) -> DirectoryResult<Hierarchy<DirectoryNode>> {
        let dn = dn.into_dn()?;
        let root = self.get_node(&dn).await?;
        let mut tree = Hierarchy::new(root);

        let mut pending = vec![tree.root()];
        while let Some(id) = pending.pop() {
            let Some(parent_dn) = tree.value(id).map(|node| node.dn().clone()) else {
                continue;
            };
            for child in self.get_children(&parent_dn).await? {
                pending.push(tree.add_child(id, child));
            }
        }

        debug!(dn = %dn, nodes = tree.size(), "Built tree level by level");
        Ok(tree)
    }

    /// One tree per naming context, each built level by level.
    #[deprecated(note = "walks the entire directory; use build_tree_fast on a naming context")]
    #[instrument(skip(self))]
    pub async fn list_all_root_trees(&mut self) -> DirectoryResult<Vec<Hierarchy<DirectoryNode>>> {
        let contexts = self.naming_contexts().await?;
        let mut trees = Vec::with_capacity(contexts.len());
        for dn in contexts {
            trees.push(self.build_tree_slow(dn).await?);
        }
        Ok(trees)
    }

    /// Close any open session.
    pub async fn close(&mut self) -> DirectoryResult<()> {
        self.connection.disconnect().await
    }
}
