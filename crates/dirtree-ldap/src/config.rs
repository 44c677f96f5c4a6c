//! LDAP connection configuration
//!
//! Host, bind credentials and the tunables of the reconnect and tree
//! building policies.

use serde::{Deserialize, Serialize};

use dirtree_core::config::{ConnectionSettings, ReconnectPolicy, TreeSettings};
use dirtree_core::error::{DirectoryError, DirectoryResult};

use crate::client::{BindCredentials, ConnectionParams};

const LDAP_SCHEME: &str = "ldap://";
const LDAPS_SCHEME: &str = "ldaps://";

/// Configuration for a directory connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// Server hostname, optionally with an `ldap://` / `ldaps://` prefix and
    /// a `:port` suffix.
    pub host: String,

    /// LDAP server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Bind DN. Leave blank together with `credential` for an anonymous bind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,

    /// Bind password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,

    /// Timeouts.
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Reconnect backoff after transient errors.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Tree materialization settings.
    #[serde(default)]
    pub tree: TreeSettings,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("principal", &self.principal)
            .field(
                "credential",
                &self.credential.as_ref().map(|_| "***REDACTED***"),
            )
            .field("connection", &self.connection)
            .field("reconnect", &self.reconnect)
            .field("tree", &self.tree)
            .finish()
    }
}

fn default_ldap_port() -> u16 {
    389
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Host, port and transport derived from the configured host string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    host: String,
    port: u16,
    use_ssl: bool,
}

fn strip_scheme<'a>(raw: &'a str, scheme: &str) -> Option<&'a str> {
    let prefix = raw.get(..scheme.len())?;
    prefix
        .eq_ignore_ascii_case(scheme)
        .then(|| &raw[scheme.len()..])
}

impl Endpoint {
    fn resolve(raw: &str, port: u16, use_ssl: bool) -> Self {
        let mut host = raw.trim();
        let mut use_ssl = use_ssl;

        if let Some(rest) = strip_scheme(host, LDAPS_SCHEME) {
            host = rest;
            use_ssl = true;
        } else if let Some(rest) = strip_scheme(host, LDAP_SCHEME) {
            host = rest;
        }
        if let Some((authority, _path)) = host.split_once('/') {
            host = authority;
        }

        let mut resolved_port = if use_ssl && port == default_ldap_port() {
            636
        } else {
            port
        };
        // Bracketed IPv6 literals keep their colons
        if let Some((name, explicit)) = host.rsplit_once(':') {
            if !name.is_empty() && !explicit.contains(']') {
                if let Ok(explicit) = explicit.parse::<u16>() {
                    host = name;
                    resolved_port = explicit;
                }
            }
        }

        Self {
            host: host.to_string(),
            port: resolved_port,
            use_ssl,
        }
    }
}

impl LdapConfig {
    /// Create a config for an anonymous bind against `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_ldap_port(),
            use_ssl: false,
            principal: None,
            credential: None,
            connection: ConnectionSettings::default(),
            reconnect: ReconnectPolicy::default(),
            tree: TreeSettings::default(),
        }
    }

    /// Set simple-bind credentials.
    pub fn with_credentials(
        mut self,
        principal: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.principal = Some(principal.into());
        self.credential = Some(credential.into());
        self
    }

    /// Enable SSL (LDAPS).
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self
    }

    /// Set the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the timeouts.
    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionSettings) -> Self {
        self.connection = connection;
        self
    }

    /// Set the result count at which tree building switches to per-level
    /// queries.
    #[must_use]
    pub fn with_fast_threshold(mut self, threshold: usize) -> Self {
        self.tree.fast_threshold = threshold;
        self
    }

    /// The LDAP URL. Any scheme given in `host` is normalized away and
    /// re-added.
    #[must_use]
    pub fn url(&self) -> String {
        let endpoint = Endpoint::resolve(&self.host, self.port, self.use_ssl);
        let scheme = if endpoint.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, endpoint.host, endpoint.port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        let endpoint = Endpoint::resolve(&self.host, self.port, self.use_ssl);
        if endpoint.host.trim().is_empty() {
            return Err(DirectoryError::invalid_configuration("host is required"));
        }

        self.bind_credentials()?;

        if self.tree.fast_threshold == 0 {
            return Err(DirectoryError::invalid_configuration(
                "tree.fast_threshold must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Resolve the bind mode: both principal and credential blank means an
    /// anonymous bind, both set a simple bind. Anything else is rejected.
    pub fn bind_credentials(&self) -> DirectoryResult<BindCredentials> {
        match (is_blank(&self.principal), is_blank(&self.credential)) {
            (true, true) => Ok(BindCredentials::Anonymous),
            (false, false) => Ok(BindCredentials::Simple {
                principal: self.principal.clone().unwrap_or_default(),
                credential: self.credential.clone().unwrap_or_default(),
            }),
            _ => Err(DirectoryError::invalid_configuration(
                "principal and credential must both be set or both be blank",
            )),
        }
    }

    /// Immutable parameters handed to the directory client on every open.
    pub fn connection_params(&self) -> DirectoryResult<ConnectionParams> {
        self.validate()?;
        Ok(ConnectionParams {
            url: self.url(),
            bind: self.bind_credentials()?,
            connection_timeout: self.connection.connection_timeout(),
            read_timeout: self.connection.read_timeout(),
        })
    }

    /// Create a redacted version of this config (for logging/display).
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.credential.is_some() {
            config.credential = Some("***REDACTED***".to_string());
        }
        config
    }
}
