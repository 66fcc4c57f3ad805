//! # Client Error Types
//!
//! Transport-level errors for the document store and remote operation clients.

use thiserror::Error;

/// Client operation result type
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("{doctype} not found: {name}")]
    NotFound { doctype: String, name: String },

    #[error("Invalid response: {field} - {reason}")]
    InvalidResponse { field: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Create an API error from HTTP response
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    pub fn not_found(doctype: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            doctype: doctype.into(),
            name: name.into(),
        }
    }

    /// Create an invalid response error for protocol violations
    ///
    /// Used when a reply is missing required fields or has the wrong shape for
    /// the operation that produced it.
    pub fn invalid_response(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is recoverable (worth retrying)
    ///
    /// Only idempotent reads are retried by the HTTP client; remote operations
    /// are never retried regardless of this answer.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::HttpError(e) => e.is_timeout() || e.is_connect(),
            ClientError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_recoverable() {
        assert!(ClientError::api_error(503, "unavailable").is_recoverable());
        assert!(!ClientError::api_error(403, "forbidden").is_recoverable());
        assert!(!ClientError::not_found("Extracted Cell", "EC-1").is_recoverable());
        assert!(!ClientError::invalid_response("message", "missing").is_recoverable());
    }
}
