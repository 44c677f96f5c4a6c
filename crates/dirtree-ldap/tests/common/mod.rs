//! Integration test helpers for dirtree-ldap.
//!
//! Provides an in-memory directory implementing the client traits, with
//! knobs for injecting read timeouts, size limits and close failures, and
//! counters for the calls made against it.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;

use dirtree_core::attribute::{RawAttribute, RawEntry, RawValue};
use dirtree_core::config::ReconnectPolicy;
use dirtree_core::dn::DistinguishedName;
use dirtree_core::error::{DirectoryError, DirectoryResult};
use dirtree_core::search::{SearchScope, ALL_OBJECTS_FILTER};
use dirtree_ldap::{
    ConnectionParams, DirectoryClient, DirectorySession, LdapConfig, SearchResults,
    ALL_USER_ATTRIBUTES,
};

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub const BASE_DN: &str = "dc=example,dc=com";

/// Config pointing at the mock with a near-zero reconnect delay.
pub fn test_config(max_attempts: u32) -> LdapConfig {
    LdapConfig::new("ldap://mock.example.com")
        .with_credentials("cn=admin,dc=example,dc=com", "secret")
        .with_reconnect(ReconnectPolicy::new(Duration::from_millis(1), max_attempts))
}

fn dn(value: &str) -> DistinguishedName {
    DistinguishedName::parse(value).expect("test DN must parse")
}

fn text_attributes(pairs: &[(&str, &str)]) -> Vec<RawAttribute> {
    let mut attributes: Vec<RawAttribute> = Vec::new();
    for (name, value) in pairs {
        let value = RawValue::Text((*value).to_string());
        match attributes.iter_mut().find(|a| a.name == *name) {
            Some(existing) => existing.values.push(value),
            None => attributes.push(RawAttribute::new(*name, vec![value])),
        }
    }
    attributes
}

#[derive(Default)]
struct Shared {
    entries: Mutex<BTreeMap<DistinguishedName, Vec<RawAttribute>>>,
    root_dse: Mutex<Vec<RawAttribute>>,
    timeouts_remaining: AtomicU32,
    always_time_out: AtomicBool,
    fail_close: AtomicBool,
    fail_open: AtomicBool,
    size_limit: Mutex<Option<usize>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    reads: AtomicUsize,
    timeouts: AtomicUsize,
}

/// In-memory directory client.
///
/// Searches under a base that does not exist return no entries rather than
/// an error. Entries are returned in DN order.
#[derive(Clone, Default)]
pub struct MockClient {
    shared: Arc<Shared>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// The directory most tests run against:
    ///
    /// ```text
    /// dc=example,dc=com
    ///   ou=groups
    ///     cn=admins
    ///   ou=people
    ///     cn=alice
    ///     cn=bob
    /// o=other
    ///   ou=archive
    /// cn=schema
    /// ```
    pub fn sample() -> Self {
        Self::new()
            .with_entry(
                BASE_DN,
                &[("objectClass", "top"), ("objectClass", "domain"), ("dc", "example")],
            )
            .with_entry(
                "ou=people,dc=example,dc=com",
                &[("objectClass", "organizationalUnit"), ("ou", "people")],
            )
            .with_entry(
                "cn=alice,ou=people,dc=example,dc=com",
                &[
                    ("objectClass", "person"),
                    ("cn", "alice"),
                    ("sn", "Liddell"),
                    ("mail", "alice@example.com"),
                ],
            )
            .with_entry(
                "cn=bob,ou=people,dc=example,dc=com",
                &[("objectClass", "person"), ("cn", "bob"), ("sn", "Builder")],
            )
            .with_entry(
                "ou=groups,dc=example,dc=com",
                &[("objectClass", "organizationalUnit"), ("ou", "groups")],
            )
            .with_entry(
                "cn=admins,ou=groups,dc=example,dc=com",
                &[
                    ("objectClass", "groupOfNames"),
                    ("cn", "admins"),
                    ("member", "cn=alice,ou=people,dc=example,dc=com"),
                ],
            )
            .with_entry("o=other", &[("objectClass", "organization"), ("o", "other")])
            .with_entry(
                "ou=archive,o=other",
                &[("objectClass", "organizationalUnit"), ("ou", "archive")],
            )
            .with_entry(
                "cn=schema",
                &[
                    ("objectClass", "subschema"),
                    ("cn", "schema"),
                    ("objectClasses", "( 2.5.6.0 NAME 'top' ABSTRACT MUST objectClass )"),
                    (
                        "objectClasses",
                        "( 2.5.6.6 NAME 'person' SUP top STRUCTURAL MUST ( sn $ cn ) MAY ( mail ) )",
                    ),
                    (
                        "objectClasses",
                        "( 0.9.2342.19200300.100.4.13 NAME 'domain' SUP top STRUCTURAL MUST dc )",
                    ),
                ],
            )
            .with_root_dse(&[
                ("namingContexts", BASE_DN),
                ("namingContexts", "o=other"),
                ("subschemaSubentry", "cn=schema"),
            ])
    }

    pub fn with_entry(self, dn_str: &str, pairs: &[(&str, &str)]) -> Self {
        self.shared
            .entries
            .lock()
            .expect("entries lock")
            .insert(dn(dn_str), text_attributes(pairs));
        self
    }

    pub fn with_raw_entry(self, dn_str: &str, attributes: Vec<RawAttribute>) -> Self {
        self.shared
            .entries
            .lock()
            .expect("entries lock")
            .insert(dn(dn_str), attributes);
        self
    }

    pub fn with_root_dse(self, pairs: &[(&str, &str)]) -> Self {
        *self.shared.root_dse.lock().expect("root DSE lock") = text_attributes(pairs);
        self
    }

    /// Return at most `limit` entries per search, flagged as truncated.
    pub fn with_size_limit(self, limit: usize) -> Self {
        *self.shared.size_limit.lock().expect("size limit lock") = Some(limit);
        self
    }

    /// Time out the next `count` reads.
    pub fn fail_next_reads(&self, count: u32) {
        self.shared.timeouts_remaining.store(count, Ordering::SeqCst);
    }

    /// Time out every read.
    pub fn always_time_out(&self, enabled: bool) {
        self.shared.always_time_out.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_close(&self, enabled: bool) {
        self.shared.fail_close.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_open(&self, enabled: bool) {
        self.shared.fail_open.store(enabled, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }

    pub fn timeouts(&self) -> usize {
        self.shared.timeouts.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.shared.opens.store(0, Ordering::SeqCst);
        self.shared.closes.store(0, Ordering::SeqCst);
        self.shared.reads.store(0, Ordering::SeqCst);
        self.shared.timeouts.store(0, Ordering::SeqCst);
    }

    pub fn arc(&self) -> Arc<dyn DirectoryClient> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl DirectoryClient for MockClient {
    async fn open(&self, params: &ConnectionParams) -> DirectoryResult<Box<dyn DirectorySession>> {
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(DirectoryError::connection_failed(format!(
                "connection refused: {}",
                params.url
            )));
        }
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            shared: Arc::clone(&self.shared),
            closed: false,
        }))
    }
}

struct MockSession {
    shared: Arc<Shared>,
    closed: bool,
}

impl MockSession {
    /// Count the read and decide whether it times out.
    fn begin_read(&self) -> DirectoryResult<()> {
        if self.closed {
            return Err(DirectoryError::operation_failed("session already closed"));
        }
        self.shared.reads.fetch_add(1, Ordering::SeqCst);

        let inject = self.shared.always_time_out.load(Ordering::SeqCst)
            || self
                .shared
                .timeouts_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if inject {
            self.shared.timeouts.fetch_add(1, Ordering::SeqCst);
            return Err(DirectoryError::read_timeout("Read timed out"));
        }
        Ok(())
    }
}

fn select(attributes: &[RawAttribute], requested: &[&str]) -> Vec<RawAttribute> {
    if requested.is_empty() || requested.contains(&ALL_USER_ATTRIBUTES) {
        return attributes.to_vec();
    }
    attributes
        .iter()
        .filter(|a| requested.iter().any(|r| r.eq_ignore_ascii_case(&a.name)))
        .cloned()
        .collect()
}

/// Matches `(objectClass=*)`, `(attr=*)`, `(attr=value)` and `(attr=prefix*)`.
fn matches(filter: &str, attributes: &[RawAttribute]) -> DirectoryResult<bool> {
    if filter == ALL_OBJECTS_FILTER {
        return Ok(true);
    }
    let inner = filter
        .strip_prefix('(')
        .and_then(|f| f.strip_suffix(')'))
        .filter(|f| !f.starts_with(['&', '|', '!']))
        .ok_or_else(|| DirectoryError::operation_failed(format!("unsupported filter {filter}")))?;
    let (name, pattern) = inner
        .split_once('=')
        .ok_or_else(|| DirectoryError::invalid_filter(filter, "missing '='"))?;

    let values = attributes
        .iter()
        .filter(|a| a.name.eq_ignore_ascii_case(name))
        .flat_map(|a| a.values.iter())
        .filter_map(|v| match v {
            RawValue::Text(s) => Some(s.to_lowercase()),
            _ => None,
        });

    let pattern = pattern.to_lowercase();
    Ok(match pattern.strip_suffix('*') {
        Some("") => attributes.iter().any(|a| a.name.eq_ignore_ascii_case(name)),
        Some(prefix) => values.into_iter().any(|v| v.starts_with(prefix)),
        None => values.into_iter().any(|v| v == pattern),
    })
}

#[async_trait]
impl DirectorySession for MockSession {
    async fn read_entry(
        &mut self,
        dn: &DistinguishedName,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<RawAttribute>> {
        self.begin_read()?;

        if dn.is_empty() {
            let root_dse = self.shared.root_dse.lock().expect("root DSE lock");
            return Ok(select(&root_dse, attributes));
        }

        let entries = self.shared.entries.lock().expect("entries lock");
        entries
            .get(dn)
            .map(|entry| select(entry, attributes))
            .ok_or_else(|| DirectoryError::operation_failed(format!("no such object: {dn}")))
    }

    async fn search(
        &mut self,
        base: &DistinguishedName,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<SearchResults> {
        self.begin_read()?;

        let entries = self.shared.entries.lock().expect("entries lock");
        let mut found = Vec::new();
        for (entry_dn, entry_attributes) in entries.iter() {
            let in_scope = match scope {
                SearchScope::Base => entry_dn == base,
                SearchScope::OneLevel => base.is_parent_of(entry_dn),
                SearchScope::Subtree => {
                    entries.contains_key(base)
                        && (entry_dn == base || entry_dn.is_descendant_of(base))
                }
            };
            if in_scope && matches(filter, entry_attributes)? {
                found.push(RawEntry::new(
                    entry_dn.to_string(),
                    select(entry_attributes, attributes),
                ));
            }
        }

        let limit = *self.shared.size_limit.lock().expect("size limit lock");
        match limit {
            Some(limit) if found.len() > limit => {
                found.truncate(limit);
                Ok(SearchResults::new(found).truncated())
            }
            _ => Ok(SearchResults::new(found)),
        }
    }

    async fn close(&mut self) -> DirectoryResult<()> {
        self.closed = true;
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_close.load(Ordering::SeqCst) {
            return Err(DirectoryError::CloseFailed {
                message: "socket already closed".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}
