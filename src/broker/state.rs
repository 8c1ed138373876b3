//! Connection state machine of the broker client.
//!
//! [`ConnectionState::apply`] is the only way the state changes; the broker
//! client holds the single instance behind a lock.

use serde::Serialize;
use std::fmt;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub last_connected: Option<SystemTime>,
    pub last_error: Option<String>,
    pub reconnect_attempts: u32,
    pub capabilities: Vec<String>,
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
    BeginConnect,
    Connected {
        capabilities: Vec<String>,
        tools: Vec<String>,
    },
    Failed(String),
    ScheduleReconnect,
    Reset,
}

impl ConnectionState {
    pub(crate) fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::BeginConnect => {
                self.status = ConnectionStatus::Connecting;
            }
            Transition::Connected {
                capabilities,
                tools,
            } => {
                self.status = ConnectionStatus::Connected;
                self.last_connected = Some(SystemTime::now());
                self.last_error = None;
                self.reconnect_attempts = 0;
                self.capabilities = capabilities;
                self.tools = tools;
            }
            Transition::Failed(reason) => {
                self.status = ConnectionStatus::Error;
                self.last_error = Some(reason);
            }
            Transition::ScheduleReconnect => {
                self.status = ConnectionStatus::Reconnecting;
                self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
            }
            Transition::Reset => *self = ConnectionState::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Connecting or already connected; a new `connect()` has nothing to do.
    pub(crate) fn is_busy(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Connected | ConnectionStatus::Connecting
        )
    }

    /// Claim the next reconnect attempt, returning how long to wait before it.
    ///
    /// Returns `None` once `max_attempts` have been used; the state is left
    /// untouched in that case.
    pub(crate) fn claim_reconnect(&mut self, base: Duration, max_attempts: u32) -> Option<Duration> {
        if self.reconnect_attempts >= max_attempts {
            return None;
        }
        let delay = reconnect_delay(base, self.reconnect_attempts);
        self.apply(Transition::ScheduleReconnect);
        Some(delay)
    }
}

/// `base * 2^attempt`, saturating.
pub fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(Duration::MAX)
}
