//! # dirtree LDAP
//!
//! Resilient LDAP access and tree materialization.
//!
//! ## Crate Organization
//!
//! - [`config`] - Host, credentials and policies (`LdapConfig`)
//! - [`client`] - Session traits the rest of the crate talks to
//! - [`session`] - `ldap3` implementation of those traits
//! - [`connection`] - Reconnecting connection state machine
//! - [`marshal`] - Raw results to `DirectoryNode`s
//! - [`service`] - Reads, searches and tree building
//! - [`schema`] - Object class definitions of an entry
//!
//! ## Example
//!
//! ```no_run
//! use dirtree_ldap::{DirectoryService, LdapConfig};
//!
//! # async fn example() -> dirtree_core::error::DirectoryResult<()> {
//! let config = LdapConfig::new("ldap.example.com")
//!     .with_credentials("cn=admin,dc=example,dc=com", "secret");
//! let mut service = DirectoryService::connect(&config).await?;
//! let tree = service.build_tree_fast("dc=example,dc=com").await?;
//! println!("{tree}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod marshal;
pub mod schema;
pub mod service;
pub mod session;

pub use client::{
    BindCredentials, ConnectionParams, DirectoryClient, DirectorySession, SearchResults,
    ALL_USER_ATTRIBUTES,
};
pub use config::LdapConfig;
pub use connection::{ConnectionState, ResilientConnection};
pub use schema::ObjectClassDefinition;
pub use service::DirectoryService;
pub use session::{Ldap3Client, Ldap3Session};
