//! Unified error types for the Tether core crate.
//!
//! This module provides the error types shared by every layer: transport
//! failures on the gateway socket, REST collaborator failures, and payload
//! decoding failures. Dispatch and state errors live in `tether-framework`.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur on the gateway connection.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Frame send failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for REST collaborator calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body or error message.
        message: String,
    },
    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Request(String),
    /// The response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// The call gate gave up after repeated 429 responses.
    #[error("rate limited on route '{route}' after {attempts} attempts")]
    RateLimited {
        /// The route bucket that kept returning 429.
        route: String,
        /// Number of attempts made.
        attempts: u32,
    },
    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ApiError {
    /// Returns the HTTP status for [`ApiError::Http`] failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors raised while turning raw JSON into typed entities.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The payload did not match the entity's shape.
    #[error("failed to parse {entity}: {reason}")]
    Entity {
        /// Entity being parsed.
        entity: &'static str,
        /// Reason for failure.
        reason: String,
    },

    /// The frame itself was not valid JSON.
    #[error("malformed gateway frame: {0}")]
    Frame(String),
}

impl DecodeError {
    /// Creates an entity parse error.
    pub fn entity(entity: &'static str, reason: impl ToString) -> Self {
        Self::Entity {
            entity,
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for REST calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_exposes_status() {
        let err = ApiError::Http {
            status: 404,
            message: "Unknown application command".into(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "HTTP 404: Unknown application command");
        assert_eq!(ApiError::Request("reset".into()).status(), None);
    }
}
