//! Error types for inbox-sync.

use std::time::Duration;

use axum::http::StatusCode;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse credentials file {path}: {reason}")]
    Credentials { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed push envelope or payload. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid envelope JSON: {0}")]
    Envelope(String),

    #[error("Invalid base64 in message data: {0}")]
    Base64(String),

    #[error("Invalid payload JSON: {0}")]
    Payload(String),

    #[error("Missing or non-string emailAddress")]
    MissingAddress,

    #[error("Invalid historyId: {0}")]
    HistoryId(String),
}

/// Failures reported by the mail backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// Transient upstream failure; callers may retry.
    #[error("Mail backend unavailable: {reason}")]
    Unavailable { reason: String },

    /// The identifier no longer resolves.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The backend rejected the bearer credential.
    #[error("Mail backend rejected credential")]
    Unauthorized,
}

impl BackendError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Failures that abort a whole processing cycle.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("No credential bound for {account}")]
    Unauthenticated { account: String },

    #[error("Upstream unavailable: {0}")]
    Unavailable(BackendError),

    #[error("Processing exceeded budget of {budget:?}")]
    Timeout { budget: Duration },

    #[error("Account worker for {account} has shut down")]
    Shutdown { account: String },
}

impl SyncError {
    /// HTTP status class surfaced to the caller of the triggering request.
    pub fn status_class(&self) -> StatusCode {
        match self {
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Unavailable(_) | Self::Timeout { .. } | Self::Shutdown { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl From<BackendError> for SyncError {
    fn from(e: BackendError) -> Self {
        Self::Unavailable(e)
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
