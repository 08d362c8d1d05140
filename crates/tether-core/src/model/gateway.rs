//! Payloads that only appear on the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Id, User};

/// Opcode 10 payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval: u64,
}

/// The application stub carried by READY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialApplication {
    /// Application id.
    pub id: Id,
}

/// READY dispatch payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version.
    #[serde(rename = "v", default)]
    pub version: u8,
    /// The connected bot user.
    pub user: User,
    /// Opaque session identifier used for resuming.
    pub session_id: String,
    /// Gateway URL to use when resuming this session.
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    /// The application the session belongs to.
    #[serde(default)]
    pub application: Option<PartialApplication>,
    /// Guilds the user is in, initially unavailable.
    #[serde(default)]
    pub guilds: Vec<Value>,
}

/// TYPING_START dispatch payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingStart {
    /// Channel the user started typing in.
    pub channel_id: Id,
    /// Guild of the channel, if any.
    #[serde(default)]
    pub guild_id: Option<Id>,
    /// The typing user.
    pub user_id: Id,
    /// Unix time in seconds.
    #[serde(default)]
    pub timestamp: u64,
}

super::impl_entity!(
    Hello => "hello",
    Ready => "ready",
    TypingStart => "typing start",
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;
    use serde_json::json;

    #[test]
    fn test_parse_ready() {
        let raw = json!({
            "v": 10,
            "user": {"id": "42", "username": "tether", "bot": true},
            "session_id": "abc123",
            "resume_gateway_url": "wss://resume.example",
            "application": {"id": "99", "flags": 0},
            "guilds": [{"id": "1", "unavailable": true}]
        });
        let ready = Ready::parse(&raw).unwrap();
        assert_eq!(ready.session_id, "abc123");
        assert_eq!(ready.user.id, Id(42));
        assert_eq!(ready.application.unwrap().id, Id(99));
        assert_eq!(ready.guilds.len(), 1);
    }

    #[test]
    fn test_parse_ready_missing_session_fails() {
        let raw = json!({"v": 10, "user": {"id": "42", "username": "tether"}});
        let err = Ready::parse(&raw).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse ready"));
    }
}
