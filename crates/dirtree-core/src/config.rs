//! Tunable settings shared by every directory backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts applied to the physical session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Per-operation read timeout in seconds. Expiry is the transient error
    /// that triggers a reconnect.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_connection_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

impl ConnectionSettings {
    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Backoff applied before reopening a session after a transient error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Sleep before each reconnect, in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub delay_ms: u64,

    /// Reconnects allowed before giving up. Reset by every disconnect.
    #[serde(default = "default_max_reconnects")]
    pub max_attempts: u32,
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnects() -> u32 {
    10
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_ms: default_reconnect_delay_ms(),
            max_attempts: default_max_reconnects(),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            max_attempts,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Tree materialization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSettings {
    /// Result count at which a single subtree search is assumed truncated
    /// and the per-level builder is used instead. Matches the page-size
    /// ceiling of the target server.
    #[serde(default = "default_fast_threshold")]
    pub fast_threshold: usize,
}

fn default_fast_threshold() -> usize {
    2000
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            fast_threshold: default_fast_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let reconnect = ReconnectPolicy::default();
        assert_eq!(reconnect.delay(), Duration::from_millis(1000));
        assert_eq!(reconnect.max_attempts, 10);
        assert_eq!(TreeSettings::default().fast_threshold, 2000);
        assert_eq!(
            ConnectionSettings::default().read_timeout(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let policy: ReconnectPolicy = serde_json::from_str(r#"{"max_attempts": 2}"#).unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay_ms, 1000);
    }

    #[test]
    fn test_policy_from_duration() {
        let policy = ReconnectPolicy::new(Duration::from_millis(5), 3);
        assert_eq!(policy.delay_ms, 5);
        assert_eq!(policy.max_attempts, 3);
    }
}
