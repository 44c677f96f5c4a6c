//! CLI configuration loading.
//!
//! Precedence, lowest to highest: YAML file, `DIRTREE_*` environment
//! variables, command-line flags.

use std::path::Path;

use serde::Deserialize;

use dirtree_ldap::LdapConfig;

use crate::error::{CliError, CliResult};

/// Contents of the YAML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub ldap: Option<LdapConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Connection settings given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub host: Option<String>,
    pub principal: Option<String>,
    pub credential: Option<String>,
    pub use_ssl: bool,
    pub fast_threshold: Option<usize>,
}

impl CliConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CliResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> CliResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| CliError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load the file at `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Resolve the final LDAP config from the file, environment and flags.
    pub fn resolve_ldap(&self, overrides: &ConnectionOverrides) -> CliResult<LdapConfig> {
        let mut config = self
            .ldap
            .clone()
            .unwrap_or_else(|| LdapConfig::new(String::new()));

        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

        if let Some(host) = &overrides.host {
            config.host = host.clone();
        }
        if let Some(principal) = &overrides.principal {
            config.principal = Some(principal.clone());
        }
        if let Some(credential) = &overrides.credential {
            config.credential = Some(credential.clone());
        }
        if overrides.use_ssl {
            config = config.with_ssl();
        }
        if let Some(threshold) = overrides.fast_threshold {
            config.tree.fast_threshold = threshold;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> CliResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("{key} has an invalid value '{value}'")))
}

/// Apply the `DIRTREE_*` tuning variables. Host and credentials are read
/// from the environment by the argument parser.
fn apply_env_overrides<F>(config: &mut LdapConfig, var: F) -> CliResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = var("DIRTREE_PORT") {
        config.port = parse_env("DIRTREE_PORT", &value)?;
    }
    if let Some(value) = var("DIRTREE_USE_SSL") {
        config.use_ssl = parse_env("DIRTREE_USE_SSL", &value)?;
    }
    if let Some(value) = var("DIRTREE_CONNECTION_TIMEOUT_SECS") {
        config.connection.connection_timeout_secs =
            parse_env("DIRTREE_CONNECTION_TIMEOUT_SECS", &value)?;
    }
    if let Some(value) = var("DIRTREE_READ_TIMEOUT_SECS") {
        config.connection.read_timeout_secs = parse_env("DIRTREE_READ_TIMEOUT_SECS", &value)?;
    }
    if let Some(value) = var("DIRTREE_RECONNECT_DELAY_MS") {
        config.reconnect.delay_ms = parse_env("DIRTREE_RECONNECT_DELAY_MS", &value)?;
    }
    if let Some(value) = var("DIRTREE_MAX_RECONNECTS") {
        config.reconnect.max_attempts = parse_env("DIRTREE_MAX_RECONNECTS", &value)?;
    }
    if let Some(value) = var("DIRTREE_FAST_THRESHOLD") {
        config.tree.fast_threshold = parse_env("DIRTREE_FAST_THRESHOLD", &value)?;
    }
    Ok(())
}
