//! Runtime error types.

use std::time::Duration;

use tether_core::{ApiError, TransportError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that end a gateway connection epoch.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The socket closed or the inbound stream ended.
    #[error("Gateway connection closed (code {code:?}): {reason}")]
    ConnectionClosed { code: Option<u16>, reason: String },

    /// No heartbeat ACK arrived while waiting to identify.
    #[error("No heartbeat ACK received after {waited:?}")]
    HeartbeatTimeout { waited: Duration },

    /// The server broke the protocol in a way the session cannot recover from.
    #[error("Gateway protocol violation: {0}")]
    Protocol(String),

    /// Fetching the gateway URL failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Connecting or writing to the socket failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The receive loop task panicked or was aborted.
    #[error("Receive loop task failed: {0}")]
    Task(String),
}

impl GatewayError {
    /// Returns true if a fresh connection may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConnectionClosed { .. } | Self::HeartbeatTimeout { .. } | Self::Transport(_) => {
                true
            }
            Self::Api(err) => !matches!(err.status(), Some(401 | 403)),
            Self::Protocol(_) | Self::Task(_) => false,
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors raised by the client facade.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The REST client could not be constructed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A required collaborator was not supplied to the builder.
    #[error("No {0} configured")]
    MissingCollaborator(&'static str),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(
            GatewayError::ConnectionClosed {
                code: Some(1006),
                reason: "reset".into()
            }
            .is_recoverable()
        );
        assert!(
            !GatewayError::Api(ApiError::Http {
                status: 401,
                message: "Unauthorized".into()
            })
            .is_recoverable()
        );
        assert!(!GatewayError::Protocol("bad hello".into()).is_recoverable());
    }
}
