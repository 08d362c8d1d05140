//! Message entity and outbound message payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Id, Sendable, User};

/// Message flag bits used by the interaction lifecycle.
pub struct MessageFlags;

impl MessageFlags {
    /// Only the invoking user can see the message.
    pub const EPHEMERAL: u64 = 1 << 6;
}

/// A message as returned by the gateway or a followup call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message id.
    pub id: Id,
    /// Channel the message was sent in.
    pub channel_id: Id,
    /// Guild of the channel, if any.
    #[serde(default)]
    pub guild_id: Option<Id>,
    /// Message author.
    #[serde(default)]
    pub author: Option<User>,
    /// Text content.
    #[serde(default)]
    pub content: String,
    /// Message flags.
    #[serde(default)]
    pub flags: u64,
}

super::impl_entity!(Message => "message");

/// The body of an outbound message (response, followup or edit).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Embeds, kept raw.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Value>,
    /// Component rows, kept raw.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Value>,
    /// Allowed mentions object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<Value>,
    /// Message flags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl MessagePayload {
    /// Creates a payload with text content.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Sets or clears the ephemeral flag.
    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        let flags = self.flags.unwrap_or(0);
        let flags = if ephemeral {
            flags | MessageFlags::EPHEMERAL
        } else {
            flags & !MessageFlags::EPHEMERAL
        };
        self.flags = (flags != 0).then_some(flags);
        self
    }
}

impl Sendable for MessagePayload {
    fn to_wire(&self) -> Value {
        super::wire_with_serde(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_skips_empty_fields() {
        let payload = MessagePayload::text("hi");
        assert_eq!(payload.to_wire(), json!({"content": "hi"}));
    }

    #[test]
    fn test_ephemeral_toggles_flag() {
        let payload = MessagePayload::text("secret").ephemeral(true);
        assert_eq!(payload.flags, Some(64));
        assert_eq!(payload.ephemeral(false).flags, None);
    }
}
