//! ldap3-backed directory client
//!
//! Opens sessions with [`ldap3`] and maps its errors onto the directory
//! error taxonomy. Read timeouts become [`DirectoryError::ReadTimeout`],
//! which the resilient connection treats as transient.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use tracing::{debug, instrument, warn};

use dirtree_core::attribute::{RawAttribute, RawEntry, RawValue};
use dirtree_core::dn::DistinguishedName;
use dirtree_core::error::{DirectoryError, DirectoryResult};
use dirtree_core::search::{SearchScope, ALL_OBJECTS_FILTER};

use crate::client::{
    BindCredentials, ConnectionParams, DirectoryClient, DirectorySession, SearchResults,
};

/// Message fragment some servers and transports use for read timeouts that
/// are not reported as a structured timeout.
const READ_TIMEOUT_MARKER: &str = "read timed out";

// LDAP result codes (RFC 4511)
const RC_SUCCESS: u32 = 0;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Check a failure message for the read-timeout marker, ignoring case.
pub fn is_read_timeout_message(message: &str) -> bool {
    message.to_lowercase().contains(READ_TIMEOUT_MARKER)
}

/// What kind of failure an [`LdapError`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    ReadTimeout,
    BadFilter,
    Other,
}

fn classify(err: &LdapError) -> Failure {
    match err {
        LdapError::Timeout { .. } => Failure::ReadTimeout,
        LdapError::Io { source } if source.kind() == io::ErrorKind::TimedOut => {
            Failure::ReadTimeout
        }
        LdapError::FilterParsing => Failure::BadFilter,
        other if is_read_timeout_message(&other.to_string()) => Failure::ReadTimeout,
        _ => Failure::Other,
    }
}

/// Map an ldap3 error raised during `context` onto a directory error.
fn map_ldap_error(err: LdapError, context: String, filter: &str) -> DirectoryError {
    match classify(&err) {
        Failure::ReadTimeout => DirectoryError::read_timeout_with_source(context, err),
        Failure::BadFilter => DirectoryError::invalid_filter(filter, err.to_string()),
        Failure::Other => DirectoryError::operation_failed_with_source(context, err),
    }
}

fn to_ldap_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

/// Collapse the text and binary maps of an ldap3 entry into raw attributes,
/// ordered by name.
fn to_raw_attributes(entry: SearchEntry) -> Vec<RawAttribute> {
    let mut attributes: Vec<RawAttribute> = entry
        .attrs
        .into_iter()
        .map(|(name, values)| {
            RawAttribute::new(name, values.into_iter().map(RawValue::Text).collect())
        })
        .collect();

    for (name, values) in entry.bin_attrs {
        let values = values.into_iter().map(RawValue::Binary);
        match attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.values.extend(values),
            None => attributes.push(RawAttribute::new(name, values.collect())),
        }
    }

    attributes.sort_by(|a, b| a.name.cmp(&b.name));
    attributes
}

/// [`DirectoryClient`] backed by `ldap3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ldap3Client;

impl Ldap3Client {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryClient for Ldap3Client {
    #[instrument(skip(self, params), fields(url = %params.url))]
    async fn open(&self, params: &ConnectionParams) -> DirectoryResult<Box<dyn DirectorySession>> {
        debug!("Connecting to LDAP server");

        let settings = LdapConnSettings::new().set_conn_timeout(params.connection_timeout);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &params.url)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {}", params.url),
                    e,
                )
            })?;

        // Spawn the connection driver
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        if let BindCredentials::Simple {
            principal,
            credential,
        } = &params.bind
        {
            debug!(bind_dn = %principal, "Performing LDAP bind");

            let result = ldap
                .with_timeout(params.read_timeout)
                .simple_bind(principal, credential)
                .await
                .map_err(|e| {
                    DirectoryError::connection_failed_with_source(
                        format!("LDAP bind failed for {}", principal),
                        e,
                    )
                })?;

            if result.rc == RC_INVALID_CREDENTIALS {
                return Err(DirectoryError::connection_failed(format!(
                    "invalid credentials for {}",
                    principal
                )));
            }
            if result.rc != RC_SUCCESS {
                return Err(DirectoryError::connection_failed(format!(
                    "LDAP bind failed with code {}: {}",
                    result.rc, result.text
                )));
            }
        }

        debug!("LDAP session established");

        Ok(Box::new(Ldap3Session {
            ldap,
            read_timeout: params.read_timeout,
        }))
    }
}

/// One authenticated ldap3 session.
pub struct Ldap3Session {
    ldap: Ldap,
    read_timeout: Duration,
}

impl std::fmt::Debug for Ldap3Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ldap3Session")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DirectorySession for Ldap3Session {
    async fn read_entry(
        &mut self,
        dn: &DistinguishedName,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<RawAttribute>> {
        let results = self
            .search(dn, SearchScope::Base, ALL_OBJECTS_FILTER, attributes)
            .await?;

        match results.entries.into_iter().next() {
            Some(entry) => Ok(entry.attributes),
            None => Err(DirectoryError::operation_failed(format!(
                "entry '{}' not found",
                dn
            ))),
        }
    }

    async fn search(
        &mut self,
        base: &DistinguishedName,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<SearchResults> {
        let base = base.to_string();
        debug!(base = %base, scope = %scope, filter = %filter, "LDAP search");

        let ldap3::SearchResult(entries, result) = self
            .ldap
            .with_timeout(self.read_timeout)
            .search(&base, to_ldap_scope(scope), filter, attributes.to_vec())
            .await
            .map_err(|e| map_ldap_error(e, format!("search under '{}'", base), filter))?;

        let size_limit_exceeded = match result.rc {
            RC_SUCCESS => false,
            RC_SIZE_LIMIT_EXCEEDED => {
                warn!(base = %base, returned = entries.len(), "Search hit the server size limit");
                true
            }
            rc if is_read_timeout_message(&result.text) => {
                return Err(DirectoryError::read_timeout(format!(
                    "search under '{}' failed with code {}: {}",
                    base, rc, result.text
                )));
            }
            rc => {
                return Err(DirectoryError::operation_failed(format!(
                    "search under '{}' failed with code {}: {}",
                    base, rc, result.text
                )));
            }
        };

        let entries = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| {
                let dn = entry.dn.clone();
                RawEntry::new(dn, to_raw_attributes(entry))
            })
            .collect();

        Ok(SearchResults {
            entries,
            size_limit_exceeded,
        })
    }

    async fn close(&mut self) -> DirectoryResult<()> {
        self.ldap
            .with_timeout(self.read_timeout)
            .unbind()
            .await
            .map_err(|e| DirectoryError::close_failed_with_source("LDAP unbind failed", e))
    }
}
