//! Core error types for lifeos-core.
//!
//! Remote adapters return [`RemoteError`]; the reconciler turns those into
//! fallback decisions instead of propagating them. Everything that can stop
//! the process (bad config, missing credentials, unwritable files) surfaces
//! as [`CoreError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for lifeos-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// OAuth-related errors
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Remote service errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Logging bootstrap errors
    #[error("Logging error: {0}")]
    Logging(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home/config directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// OAuth-specific errors.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// Authorization failed
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Token refresh failed
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Callback timeout
    #[error("OAuth callback timeout: no callback received within {timeout_secs} seconds")]
    CallbackTimeout { timeout_secs: u64 },

    /// Invalid callback
    #[error("Invalid OAuth callback: {0}")]
    InvalidCallback(String),

    /// Access token expired
    #[error("Access token expired and no refresh token available")]
    TokenExpired,

    /// Not authenticated
    #[error("Not authenticated with {service}")]
    NotAuthenticated { service: String },

    /// Credentials not configured
    #[error("OAuth credentials not configured for {service}")]
    CredentialsNotConfigured { service: String },

    /// Token file could not be read or written
    #[error("Token storage error: {0}")]
    Storage(String),
}

/// Errors returned by the remote store adapters.
///
/// Every variant is recoverable from the reconciler's point of view.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the service
    #[error("{service} API error (HTTP {status}): {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Response did not have the expected shape
    #[error("Malformed {service} response: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },

    /// No usable access token
    #[error("Authentication failed: {0}")]
    Auth(#[from] OAuthError),
}

impl RemoteError {
    pub(crate) fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        RemoteError::Malformed {
            service,
            message: message.into(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_mentions_service_and_code() {
        let err = RemoteError::Status {
            service: "Notion",
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "Notion API error (HTTP 429): rate limited");
    }

    #[test]
    fn remote_error_lifts_into_core_error() {
        let err: CoreError = RemoteError::malformed("Google Tasks", "missing id").into();
        assert!(matches!(err, CoreError::Remote(RemoteError::Malformed { .. })));
        assert!(err.to_string().contains("missing id"));
    }
}
