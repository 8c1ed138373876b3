use crate::broker::ConnectionStatus;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Authentication error (status: {status:?}): {message}")]
    Auth {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("Not found (status: {status:?}): {message}")]
    NotFound {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("Permission denied (status: {status:?}): {message}")]
    Permission {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("Figma API unavailable (status: {}): {message}", .status.as_u16())]
    RateLimitOrServer { status: StatusCode, message: String },

    #[error("Network error: {message}")]
    Network { message: String, timed_out: bool },

    #[error("Broker not connected (state: {state})")]
    NotConnected { state: ConnectionStatus },

    #[error("No broker tool mapped for path: {path}")]
    NoToolMapping { path: String },

    #[error("Broker tool '{tool}' failed: {source}")]
    Broker {
        tool: String,
        #[source]
        source: Box<BridgeError>,
    },

    #[error("Invalid broker response: {0}")]
    InvalidResponse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected error (status: {status:?}): {message}")]
    Unexpected {
        status: Option<StatusCode>,
        message: String,
    },
}

impl BridgeError {
    /// Classify a non-success HTTP status into the transport taxonomy.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::UNAUTHORIZED => BridgeError::Auth {
                status: Some(status),
                message,
            },
            StatusCode::FORBIDDEN => BridgeError::Permission {
                status: Some(status),
                message,
            },
            StatusCode::NOT_FOUND => BridgeError::NotFound {
                status: Some(status),
                message,
            },
            s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                BridgeError::RateLimitOrServer { status, message }
            }
            _ => BridgeError::Unexpected {
                status: Some(status),
                message,
            },
        }
    }

    /// Map a reqwest failure that happened before a usable response arrived.
    ///
    /// The URL is stripped so query strings never end up in logs.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status, err.without_url().to_string());
        }
        if err.is_decode() || err.is_body() {
            return BridgeError::Unexpected {
                status: None,
                message: err.without_url().to_string(),
            };
        }
        let timed_out = err.is_timeout();
        BridgeError::Network {
            message: err.without_url().to_string(),
            timed_out,
        }
    }

    pub fn missing_credentials() -> Self {
        BridgeError::Auth {
            status: None,
            message: "no Figma access token configured; set FIGMA_TOKEN or FIGMA_OAUTH_TOKEN"
                .to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BridgeError::Validation(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        BridgeError::InvalidResponse(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        BridgeError::Unexpected {
            status: None,
            message: message.into(),
        }
    }

    /// HTTP status attached to the error, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BridgeError::Auth { status, .. }
            | BridgeError::NotFound { status, .. }
            | BridgeError::Permission { status, .. }
            | BridgeError::Unexpected { status, .. } => *status,
            BridgeError::RateLimitOrServer { status, .. } => Some(*status),
            BridgeError::Broker { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Timeouts, dropped connections, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::RateLimitOrServer { .. } | BridgeError::Network { .. } => true,
            BridgeError::Broker { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            BridgeError::Auth { .. } => ErrorPayload::new(
                ErrorCategory::Auth,
                self.to_string(),
                "Set FIGMA_TOKEN (or FIGMA_OAUTH_TOKEN) to a valid token.",
            ),
            BridgeError::NotFound { .. } => ErrorPayload::new(
                ErrorCategory::Figma,
                self.to_string(),
                "Check the file key / node id; the resource may have been deleted.",
            ),
            BridgeError::Permission { .. } => ErrorPayload::new(
                ErrorCategory::Auth,
                self.to_string(),
                "Make sure the token's account has access to this file or team.",
            ),
            BridgeError::RateLimitOrServer { .. } => ErrorPayload::new(
                ErrorCategory::Figma,
                self.to_string(),
                "Figma is rate limiting or failing; wait and retry.",
            ),
            BridgeError::Network { .. } => ErrorPayload::new(
                ErrorCategory::Network,
                self.to_string(),
                "Check connectivity/proxy/VPN and retry.",
            ),
            BridgeError::NotConnected { .. }
            | BridgeError::NoToolMapping { .. }
            | BridgeError::Broker { .. }
            | BridgeError::InvalidResponse(_) => ErrorPayload::new(
                ErrorCategory::Broker,
                self.to_string(),
                "Check that the broker is running (FIGMA_MCP_URL) or use --transport direct.",
            ),
            BridgeError::Validation(_) => ErrorPayload::new(
                ErrorCategory::Validation,
                self.to_string(),
                "Node ids look like '123:45'; file keys come from the Figma URL.",
            ),
            BridgeError::Config(_) => ErrorPayload::new(
                ErrorCategory::Config,
                self.to_string(),
                "Check the config file and FIGMA_MCP_* environment variables.",
            ),
            BridgeError::Unexpected { .. } => ErrorPayload::new(
                ErrorCategory::Unknown,
                self.to_string(),
                "Re-run with --verbose; file an issue if persistent.",
            ),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Unexpected {
            status: None,
            message: format!("failed to decode response: {err}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Auth,
    Network,
    Figma,
    Broker,
    Validation,
    Config,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
