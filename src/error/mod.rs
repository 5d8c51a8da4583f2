//! Error Types
//!
//! Error hierarchy for credential lifecycle and resilient transport
//! operations.

use std::time::Duration;
use thiserror::Error;

/// Root error type for SDK authentication and transport operations.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigurationError),

    #[error("operation cancelled")]
    Cancelled,
}

impl AuthError {
    /// Check if this failure is likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Stable error kind for logging and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Network(NetworkError::Timeout { .. }) => "timeout",
            Self::Network(NetworkError::CircuitOpen) => "circuit_open",
            Self::Network(_) => "network",
            Self::Protocol(_) => "protocol",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Token(TokenError::NoRefreshToken) => "no_refresh_token",
            Self::Token(TokenError::RefreshFailed { .. }) => "refresh_failed",
            Self::Token(_) => "token",
            Self::Storage(StorageError::UnsupportedPlatform { .. }) => "unsupported_platform",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::Cancelled => "cancelled",
        }
    }

    /// Check if the caller should re-run the interactive login flow.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. }
                | Self::Token(TokenError::NoRefreshToken)
                | Self::Token(TokenError::RefreshFailed { .. })
        )
    }
}

/// Transport-level error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("transient HTTP status {status}")]
    TransientStatus { status: u16 },

    #[error("circuit breaker is open")]
    CircuitOpen,
}

impl NetworkError {
    /// Check if this failure is likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::CircuitOpen)
    }
}

/// Response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },
}

/// Credential lifecycle error.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("no credential found for key: {key}")]
    NotFound { key: String },

    #[error("no refresh token available")]
    NoRefreshToken,

    /// Shared across all callers that joined one refresh attempt, hence the
    /// `Arc`.
    #[error("token refresh failed: {source}")]
    RefreshFailed {
        #[source]
        source: std::sync::Arc<AuthError>,
    },
}

/// Storage backend error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("read failed: {message}")]
    ReadFailed { message: String },

    #[error("write failed: {message}")]
    WriteFailed { message: String },

    #[error("delete failed: {message}")]
    DeleteFailed { message: String },

    #[error("encryption failed: {message}")]
    EncryptionFailed { message: String },

    #[error("decryption failed: {message}")]
    DecryptionFailed { message: String },

    #[error("storage backend not supported on this platform: {message}")]
    UnsupportedPlatform { message: String },
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("missing required field: {field}")]
    MissingRequired { field: String },

    #[error("invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },
}

/// Result type for SDK authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// OAuth2 error response body from the token endpoint (RFC 6749 §5.2).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Parse an RFC 6749 error body, if the body is one.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Map a non-success token endpoint response to an error.
pub fn error_from_response(status: u16, body: &str) -> AuthError {
    let description = parse_error_response(body).map(|r| {
        r.error_description
            .map(|d| format!("{}: {}", r.error, d))
            .unwrap_or(r.error)
    });

    match status {
        401 => AuthError::Unauthorized {
            message: description.unwrap_or_else(|| "invalid client credentials".to_string()),
        },
        408 | 429 | 500 | 502 | 503 | 504 => {
            AuthError::Network(NetworkError::TransientStatus { status })
        }
        _ => AuthError::Protocol(ProtocolError::InvalidResponse {
            message: description.unwrap_or_else(|| format!("HTTP {}", status)),
        }),
    }
}

/// Check if an HTTP status code should be treated as a transient failure.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}
