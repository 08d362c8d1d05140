//! Error types for interaction dispatch and the response lifecycle.

use tether_core::model::InteractionType;
use tether_core::{ApiError, Id};
use thiserror::Error;

/// Boxed error carried by a failed user callback.
pub type CallbackSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A response or followup call made in the wrong lifecycle state.
///
/// These are programming errors on the caller's side and are raised
/// immediately, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// `generate_response` was called a second time.
    #[error("a response has already been generated for this interaction")]
    AlreadyResponded,

    /// A followup or original-message action before any response.
    #[error("no response has been generated for this interaction yet")]
    NotResponded,

    /// Edit or delete without a target and without a previously sent followup.
    #[error("no followup message has been sent for this interaction")]
    NoFollowup,
}

/// Errors raised by the response lifecycle.
#[derive(Debug, Clone, Error)]
pub enum ResponseError {
    /// Lifecycle violation.
    #[error(transparent)]
    State(#[from] StateError),

    /// The REST call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ResponseError {
    /// Returns the HTTP status if the REST call was rejected.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(err) => err.status(),
            Self::State(_) => None,
        }
    }
}

/// Errors raised while routing an interaction to its callback.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A component interaction arrived for a custom id that is not registered
    /// (never registered, already consumed, or expired).
    #[error("untracked interaction: no callback registered for custom id '{custom_id}'")]
    UntrackedInteraction {
        /// The unknown custom id.
        custom_id: String,
    },

    /// No resolution tier produced a callback for an application command.
    #[error("no callback registered for command {command_id} ({})", .name.as_deref().unwrap_or("unknown name"))]
    CommandNotFound {
        /// The invoked command id.
        command_id: Id,
        /// The command name, if a lookup returned one.
        name: Option<String>,
    },

    /// The guild-scoped lookup needs a guild id the interaction does not carry.
    #[error("command {command_id} needs a guild lookup but the interaction has no guild id")]
    MissingGuild {
        /// The invoked command id.
        command_id: Id,
    },

    /// A required field is absent from the interaction payload.
    #[error("interaction payload is missing '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// The interaction type is not routed by this client.
    #[error("unsupported interaction type {kind:?}")]
    UnsupportedInteraction {
        /// The received type.
        kind: InteractionType,
    },

    /// A user callback returned an error.
    #[error("callback for {target} failed: {source}")]
    Callback {
        /// Command name or custom id the callback was registered under.
        target: String,
        /// The error returned by the callback.
        #[source]
        source: CallbackSource,
    },

    /// A REST lookup failed for a reason other than "not found".
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl DispatchError {
    /// Wraps a callback error.
    pub fn callback(target: impl Into<String>, error: anyhow::Error) -> Self {
        Self::Callback {
            target: target.into(),
            source: error.into(),
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for response operations.
pub type ResponseResult<T> = Result<T, ResponseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_callback_error_keeps_cause() {
        let err = DispatchError::callback("ping", anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "callback for ping failed: boom");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("boom"));
    }

    #[test]
    fn test_response_error_status() {
        let err = ResponseError::from(ApiError::Http {
            status: 401,
            message: "Invalid Webhook Token".into(),
        });
        assert_eq!(err.status(), Some(401));
        assert_eq!(ResponseError::from(StateError::NotResponded).status(), None);
    }
}
