//! Error taxonomy for the session core.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here is fatal to the process. Gateway errors describe what the
//! server or transport did; session errors describe what the controller
//! decided, and every variant has a defined terminal UI state.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

use crate::validate::{FieldError, ValidationErrors};

/// Notice shown when a refresh fails and the user is signed out.
pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Please log in again.";

/// Stable machine-readable code for an error value.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same call unchanged could succeed.
    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// GATEWAY
// =============================================================================

/// Outcome of a failed request at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// HTTP 401 on an authenticated call: the bearer token was rejected.
    #[error("access token rejected (status {status})")]
    Unauthorized { status: u16 },

    /// Any other non-success status.
    #[error("request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String, fields: Vec<FieldError> },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The request could not be built (bad URL segment, bad MIME type).
    #[error("request encode failed: {0}")]
    Encode(String),

    /// A success response whose body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "E_UNAUTHORIZED",
            Self::Rejected { .. } => "E_REJECTED",
            Self::Transport(_) => "E_TRANSPORT",
            Self::Encode(_) => "E_ENCODE",
            Self::Decode(_) => "E_DECODE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Rejected { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Errors returned by session controller operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Form input failed client-side checks; no request was sent.
    #[error("invalid input: {0}")]
    Validation(ValidationErrors),

    /// The server declined a login or signup. Session left untouched.
    #[error("{message}")]
    AuthRejected { message: String, fields: Vec<FieldError> },

    /// Refreshing the access token failed. Credentials were cleared.
    #[error("session expired: {0}")]
    RefreshFailed(String),

    /// A resource call was attempted without an active session.
    #[error("not signed in")]
    NotAuthenticated,

    /// A resource call failed for a reason other than authorization.
    #[error(transparent)]
    Gateway(GatewayError),
}

impl SessionError {
    /// Whether the UI should show [`SESSION_EXPIRED_NOTICE`].
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::RefreshFailed(_))
    }

    /// Message suitable for a toast or a CLI error line.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(_) => "Please fix the form errors.".to_owned(),
            Self::RefreshFailed(_) => SESSION_EXPIRED_NOTICE.to_owned(),
            Self::Gateway(GatewayError::Rejected { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ValidationErrors> for SessionError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::AuthRejected { .. } => "E_AUTH_REJECTED",
            Self::RefreshFailed(_) => "E_REFRESH_FAILED",
            Self::NotAuthenticated => "E_NOT_AUTHENTICATED",
            Self::Gateway(inner) => inner.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Gateway(inner) => inner.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// STORAGE
// =============================================================================

/// Credential store failures. Logged and treated as "no credential".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("stored credential is corrupt: {0}")]
    Corrupt(String),

    #[error("credential storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
