//! Gateway wire protocol.
//!
//! Every frame on the socket is a JSON object `{op, d, s, t}`. The client
//! consumes opcodes 0, 1, 7, 9, 10 and 11 and produces 1, 2 and 6.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{DecodeError, DecodeResult};

/// Gateway API version appended to the connect URL.
pub const GATEWAY_VERSION: u8 = 10;

/// Builds the socket URL from the address returned by the REST collaborator.
pub fn gateway_url(base: &str) -> String {
    format!(
        "{}/?v={GATEWAY_VERSION}&encoding=json",
        base.trim_end_matches('/')
    )
}

// =============================================================================
// Opcodes
// =============================================================================

/// Gateway opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// An event was dispatched.
    Dispatch = 0,
    /// Heartbeat, sent by either side.
    Heartbeat = 1,
    /// Start a new session.
    Identify = 2,
    /// Update presence.
    PresenceUpdate = 3,
    /// Join or move between voice channels.
    VoiceStateUpdate = 4,
    /// Resume a previous session.
    Resume = 6,
    /// The server asks the client to reconnect.
    Reconnect = 7,
    /// Request guild members.
    RequestGuildMembers = 8,
    /// The session has been invalidated.
    InvalidSession = 9,
    /// Sent right after connecting; carries the heartbeat interval.
    Hello = 10,
    /// Acknowledges a heartbeat.
    HeartbeatAck = 11,
}

impl OpCode {
    /// Returns the numeric opcode.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            other => return Err(other),
        })
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

// =============================================================================
// Frames
// =============================================================================

/// A raw gateway frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    /// Opcode.
    pub op: u8,
    /// Payload.
    #[serde(default)]
    pub d: Value,
    /// Sequence number; only present on dispatches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    /// Event type; only present on dispatches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayFrame {
    /// Parses a text frame.
    pub fn parse(text: &str) -> DecodeResult<Self> {
        serde_json::from_str(text).map_err(|e| DecodeError::Frame(e.to_string()))
    }

    /// Returns the typed opcode, or the raw value if it is unknown.
    pub fn opcode(&self) -> Result<OpCode, u8> {
        OpCode::try_from(self.op)
    }

    /// Heartbeat carrying the last seen sequence number (`null` if none).
    pub fn heartbeat(seq: Option<u64>) -> Self {
        Self::outbound(OpCode::Heartbeat, json!(seq))
    }

    /// Identify with the session credentials.
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::outbound(OpCode::Identify, json!(payload))
    }

    /// Resume a previous session.
    pub fn resume(token: &str, session_id: &str, seq: u64) -> Self {
        Self::outbound(
            OpCode::Resume,
            json!({ "token": token, "session_id": session_id, "seq": seq }),
        )
    }

    fn outbound(op: OpCode, d: Value) -> Self {
        Self {
            op: op.code(),
            d,
            s: None,
            t: None,
        }
    }

    /// Serializes the frame for the socket.
    pub fn to_text(&self) -> String {
        // A frame holds only JSON values and plain integers, which always serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

// =============================================================================
// Identify
// =============================================================================

/// Client properties sent with Identify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Operating system.
    pub os: String,
    /// Library name.
    pub browser: String,
    /// Library name.
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "tether".to_string(),
            device: "tether".to_string(),
        }
    }
}

/// The `d` object of an Identify frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Bot token.
    pub token: String,
    /// Intent bitmask.
    pub intents: Intents,
    /// Client properties.
    pub properties: ConnectionProperties,
}

impl IdentifyPayload {
    /// Creates an identify payload with default properties.
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            intents,
            properties: ConnectionProperties::default(),
        }
    }
}

// =============================================================================
// Intents
// =============================================================================

/// Gateway intent bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intents(pub u64);

impl Intents {
    pub const GUILDS: Self = Self(1 << 0);
    pub const GUILD_MEMBERS: Self = Self(1 << 1);
    pub const GUILD_MODERATION: Self = Self(1 << 2);
    pub const GUILD_EXPRESSIONS: Self = Self(1 << 3);
    pub const GUILD_INTEGRATIONS: Self = Self(1 << 4);
    pub const GUILD_WEBHOOKS: Self = Self(1 << 5);
    pub const GUILD_INVITES: Self = Self(1 << 6);
    pub const GUILD_VOICE_STATES: Self = Self(1 << 7);
    pub const GUILD_PRESENCES: Self = Self(1 << 8);
    pub const GUILD_MESSAGES: Self = Self(1 << 9);
    pub const GUILD_MESSAGE_REACTIONS: Self = Self(1 << 10);
    pub const GUILD_MESSAGE_TYPING: Self = Self(1 << 11);
    pub const DIRECT_MESSAGES: Self = Self(1 << 12);
    pub const DIRECT_MESSAGE_REACTIONS: Self = Self(1 << 13);
    pub const DIRECT_MESSAGE_TYPING: Self = Self(1 << 14);
    pub const MESSAGE_CONTENT: Self = Self(1 << 15);
    pub const GUILD_SCHEDULED_EVENTS: Self = Self(1 << 16);
    pub const AUTO_MODERATION_CONFIGURATION: Self = Self(1 << 20);
    pub const AUTO_MODERATION_EXECUTION: Self = Self(1 << 21);

    /// No intents.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every intent that does not require approval.
    pub const fn non_privileged() -> Self {
        Self(
            (1 << 0)
                | (1 << 2)
                | (1 << 3)
                | (1 << 4)
                | (1 << 5)
                | (1 << 6)
                | (1 << 7)
                | (1 << 9)
                | (1 << 10)
                | (1 << 11)
                | (1 << 12)
                | (1 << 13)
                | (1 << 14)
                | (1 << 16)
                | (1 << 20)
                | (1 << 21),
        )
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Intents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Intents {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_frames() {
        assert_eq!(GatewayFrame::heartbeat(None).to_text(), r#"{"op":1,"d":null}"#);
        assert_eq!(GatewayFrame::heartbeat(Some(3)).to_text(), r#"{"op":1,"d":3}"#);
    }

    #[test]
    fn test_identify_frame_shape() {
        let payload = IdentifyPayload::new("tok", Intents::GUILDS | Intents::GUILD_MESSAGES);
        let frame = GatewayFrame::identify(&payload);
        let value: Value = serde_json::from_str(&frame.to_text()).unwrap();
        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["token"], "tok");
        assert_eq!(value["d"]["intents"], 513);
        assert_eq!(value["d"]["properties"]["browser"], "tether");
        assert!(value.get("s").is_none());
    }

    #[test]
    fn test_parse_dispatch_frame() {
        let frame = GatewayFrame::parse(r#"{"op":0,"d":{},"s":42,"t":"TYPING_START"}"#).unwrap();
        assert_eq!(frame.opcode(), Ok(OpCode::Dispatch));
        assert_eq!(frame.s, Some(42));
        assert_eq!(frame.t.as_deref(), Some("TYPING_START"));
    }

    #[test]
    fn test_parse_hello_with_null_fields() {
        let frame =
            GatewayFrame::parse(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#)
                .unwrap();
        assert_eq!(frame.opcode(), Ok(OpCode::Hello));
        assert_eq!(frame.s, None);
    }

    #[test]
    fn test_unknown_opcode() {
        let frame = GatewayFrame::parse(r#"{"op":42,"d":null}"#).unwrap();
        assert_eq!(frame.opcode(), Err(42));
        assert!(GatewayFrame::parse("not json").is_err());
    }

    #[test]
    fn test_gateway_url() {
        assert_eq!(
            gateway_url("wss://gateway.discord.gg/"),
            "wss://gateway.discord.gg/?v=10&encoding=json"
        );
    }

    #[test]
    fn test_intents() {
        let intents = Intents::GUILDS | Intents::MESSAGE_CONTENT;
        assert!(intents.contains(Intents::GUILDS));
        assert!(!intents.contains(Intents::GUILD_MEMBERS));
        assert!(!Intents::non_privileged().contains(Intents::MESSAGE_CONTENT));
        assert!(!Intents::non_privileged().contains(Intents::GUILD_PRESENCES));
    }
}
