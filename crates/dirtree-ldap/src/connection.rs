//! Resilient connection
//!
//! Owns at most one open [`DirectorySession`] and reopens it after transient
//! failures, sleeping before each reopen and giving up once the reconnect
//! ceiling is reached.
//!
//! ```text
//!                 connect()                    mark_for_reconnect()
//! Disconnected ─────────────► Connected ─────────────────────► PendingReconnect
//!      ▲                          │                                  │
//!      └──────── disconnect() ────┘◄──── connect() (sleep, attempt) ─┘
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use dirtree_core::config::ReconnectPolicy;
use dirtree_core::error::{DirectoryError, DirectoryResult};

use crate::client::{ConnectionParams, DirectoryClient, DirectorySession};
use crate::config::LdapConfig;

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    PendingReconnect,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::PendingReconnect => write!(f, "pending_reconnect"),
        }
    }
}

enum State {
    Disconnected,
    Connected(Box<dyn DirectorySession>),
    /// Holds the failed session, if any, so the next connect can close it.
    PendingReconnect(Option<Box<dyn DirectorySession>>),
}

impl State {
    fn kind(&self) -> ConnectionState {
        match self {
            State::Disconnected => ConnectionState::Disconnected,
            State::Connected(_) => ConnectionState::Connected,
            State::PendingReconnect(_) => ConnectionState::PendingReconnect,
        }
    }
}

/// A directory connection that recovers from transient errors.
///
/// Access is serialized through `&mut self`; callers drive the
/// connect / operate / disconnect cycle (see `DirectoryService`).
pub struct ResilientConnection {
    client: Arc<dyn DirectoryClient>,
    params: ConnectionParams,
    policy: ReconnectPolicy,
    state: State,
    reconnect_attempts: u32,
}

impl fmt::Debug for ResilientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientConnection")
            .field("params", &self.params)
            .field("policy", &self.policy)
            .field("state", &self.state.kind())
            .field("reconnect_attempts", &self.reconnect_attempts)
            .finish()
    }
}

impl ResilientConnection {
    /// Validate the configuration and prove the directory is reachable by
    /// opening and closing one session.
    #[instrument(skip(client, config), fields(url = %config.url()))]
    pub async fn new(client: Arc<dyn DirectoryClient>, config: &LdapConfig) -> DirectoryResult<Self> {
        let params = config.connection_params()?;
        let mut connection = Self {
            client,
            params,
            policy: config.reconnect.clone(),
            state: State::Disconnected,
            reconnect_attempts: 0,
        };

        connection.connect().await?;
        connection.disconnect().await?;

        info!(
            max_attempts = connection.policy.max_attempts,
            delay_ms = connection.policy.delay_ms,
            "Directory reachable"
        );
        Ok(connection)
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state.kind()
    }

    /// Reconnects performed since the last disconnect (or fresh connect).
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Open a fresh session and return it. An already open session is
    /// closed first.
    ///
    /// After [`mark_for_reconnect`](Self::mark_for_reconnect) this sleeps for
    /// the policy delay, closes the failed session and opens a new one,
    /// counting the attempt. Once the count has reached the ceiling it fails
    /// with [`DirectoryError::ReconnectLimitExceeded`] instead.
    pub async fn connect(&mut self) -> DirectoryResult<&mut dyn DirectorySession> {
        let stale = match std::mem::replace(&mut self.state, State::Disconnected) {
            State::Connected(session) => {
                self.reconnect_attempts = 0;
                Some(session)
            }
            State::Disconnected => {
                self.reconnect_attempts = 0;
                None
            }
            State::PendingReconnect(stale) => {
                if self.reconnect_attempts >= self.policy.max_attempts {
                    let attempts = self.reconnect_attempts;
                    self.state = State::PendingReconnect(stale);
                    warn!(
                        attempts,
                        limit = self.policy.max_attempts,
                        "Reconnect limit reached"
                    );
                    return Err(DirectoryError::ReconnectLimitExceeded {
                        attempts,
                        limit: self.policy.max_attempts,
                    });
                }

                self.reconnect_attempts += 1;
                info!(
                    attempt = self.reconnect_attempts,
                    limit = self.policy.max_attempts,
                    delay_ms = self.policy.delay_ms,
                    "Reconnecting to directory"
                );
                tokio::time::sleep(self.policy.delay()).await;
                stale
            }
        };

        if let Some(mut session) = stale {
            session.close().await?;
            debug!("Closed previous session");
        }

        let session = self.client.open(&self.params).await?;
        debug!("Directory session opened");
        self.state = State::Connected(session);
        self.session_mut()
    }

    /// Close the open session, if any, and reset the reconnect count.
    /// A pending reconnect is abandoned.
    pub async fn disconnect(&mut self) -> DirectoryResult<()> {
        self.reconnect_attempts = 0;
        let session = match std::mem::replace(&mut self.state, State::Disconnected) {
            State::Connected(session) => Some(session),
            State::PendingReconnect(stale) => stale,
            State::Disconnected => None,
        };

        if let Some(mut session) = session {
            session.close().await?;
            debug!("Directory session closed");
        }
        Ok(())
    }

    /// Flag that the current session failed transiently. The next
    /// [`connect`](Self::connect) replaces it.
    pub fn mark_for_reconnect(&mut self) {
        self.state = match std::mem::replace(&mut self.state, State::Disconnected) {
            State::Connected(session) => State::PendingReconnect(Some(session)),
            State::PendingReconnect(stale) => State::PendingReconnect(stale),
            State::Disconnected => State::PendingReconnect(None),
        };
    }

    fn session_mut(&mut self) -> DirectoryResult<&mut dyn DirectorySession> {
        match &mut self.state {
            State::Connected(session) => Ok(session.as_mut()),
            other => Err(DirectoryError::invariant(format!(
                "no open session (state: {})",
                other.kind()
            ))),
        }
    }
}
