//! # dirtree core
//!
//! Directory-agnostic building blocks for reading a hierarchical directory
//! and materializing it as an in-memory tree.
//!
//! ## Crate Organization
//!
//! - [`error`] - Error taxonomy with transient/fatal classification
//! - [`dn`] - Distinguished names (`DistinguishedName`, `Rdn`)
//! - [`attribute`] - Multi-bucket attribute records and raw client values
//! - [`node`] - `DirectoryNode`, a DN with its attributes
//! - [`hierarchy`] - Generic arena-backed tree with predicate linking
//! - [`search`] - Search scope and filter checks
//! - [`config`] - Timeouts, reconnect policy and tree settings

pub mod attribute;
pub mod config;
pub mod dn;
pub mod error;
pub mod hierarchy;
pub mod node;
pub mod search;

/// Prelude module for convenient imports.
///
/// ```
/// use dirtree_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::attribute::{AttributeRecord, RawAttribute, RawEntry, RawValue};
    pub use crate::config::{ConnectionSettings, ReconnectPolicy, TreeSettings};
    pub use crate::dn::{DistinguishedName, IntoDn, Rdn};
    pub use crate::error::{DirectoryError, DirectoryResult};
    pub use crate::hierarchy::{Hierarchy, NodeId};
    pub use crate::node::DirectoryNode;
    pub use crate::search::{validate_filter, SearchScope, ALL_OBJECTS_FILTER};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let dn = DistinguishedName::parse("cn=test,dc=example,dc=com").unwrap();
        let attrs = AttributeRecord::new().with("cn", "test");
        let node = DirectoryNode::new(dn, attrs).unwrap();
        let tree = Hierarchy::new(node);
        assert_eq!(tree.size(), 1);
        let _scope = SearchScope::Subtree;
        let _policy = ReconnectPolicy::default();
    }
}
