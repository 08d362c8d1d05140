//! Gateway event kinds and the dispatch decoder.
//!
//! [`decode`] maps a dispatch envelope's `t` and `d` fields to a
//! [`GatewayEvent`]. Kinds with a typed model are parsed through
//! [`Entity::parse`]; every other known kind is passed through as raw JSON.
//! Unknown kinds decode to `None` and are never an error.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use tracing::error;

use crate::error::DecodeResult;
use crate::model::{Entity, Guild, Interaction, Message, Ready, TypingStart, User};

/// Invokes `$callback!` with the full table of dispatch event kinds.
///
/// Each row is `Variant => "WIRE_NAME", hook_method;`. Used to generate
/// [`EventKind`] and the per-kind hook methods of the event router.
#[macro_export]
macro_rules! for_each_event_kind {
    ($callback:ident) => {
        $callback! {
            Ready => "READY", on_ready;
            Resumed => "RESUMED", on_resumed;
            ApplicationCommandPermissionsUpdate => "APPLICATION_COMMAND_PERMISSIONS_UPDATE", on_application_command_permissions_update;
            AutoModerationRuleCreate => "AUTO_MODERATION_RULE_CREATE", on_auto_moderation_rule_create;
            AutoModerationRuleUpdate => "AUTO_MODERATION_RULE_UPDATE", on_auto_moderation_rule_update;
            AutoModerationRuleDelete => "AUTO_MODERATION_RULE_DELETE", on_auto_moderation_rule_delete;
            AutoModerationActionExecution => "AUTO_MODERATION_ACTION_EXECUTION", on_auto_moderation_action_execution;
            ChannelCreate => "CHANNEL_CREATE", on_channel_create;
            ChannelUpdate => "CHANNEL_UPDATE", on_channel_update;
            ChannelDelete => "CHANNEL_DELETE", on_channel_delete;
            ChannelPinsUpdate => "CHANNEL_PINS_UPDATE", on_channel_pins_update;
            ThreadCreate => "THREAD_CREATE", on_thread_create;
            ThreadUpdate => "THREAD_UPDATE", on_thread_update;
            ThreadDelete => "THREAD_DELETE", on_thread_delete;
            ThreadListSync => "THREAD_LIST_SYNC", on_thread_list_sync;
            ThreadMemberUpdate => "THREAD_MEMBER_UPDATE", on_thread_member_update;
            ThreadMembersUpdate => "THREAD_MEMBERS_UPDATE", on_thread_members_update;
            GuildCreate => "GUILD_CREATE", on_guild_create;
            GuildUpdate => "GUILD_UPDATE", on_guild_update;
            GuildDelete => "GUILD_DELETE", on_guild_delete;
            GuildBanAdd => "GUILD_BAN_ADD", on_guild_ban_add;
            GuildBanRemove => "GUILD_BAN_REMOVE", on_guild_ban_remove;
            GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE", on_guild_emojis_update;
            GuildStickersUpdate => "GUILD_STICKERS_UPDATE", on_guild_stickers_update;
            GuildIntegrationsUpdate => "GUILD_INTEGRATIONS_UPDATE", on_guild_integrations_update;
            GuildMemberAdd => "GUILD_MEMBER_ADD", on_guild_member_add;
            GuildMemberRemove => "GUILD_MEMBER_REMOVE", on_guild_member_remove;
            GuildMemberUpdate => "GUILD_MEMBER_UPDATE", on_guild_member_update;
            GuildMembersChunk => "GUILD_MEMBERS_CHUNK", on_guild_members_chunk;
            GuildRoleCreate => "GUILD_ROLE_CREATE", on_guild_role_create;
            GuildRoleUpdate => "GUILD_ROLE_UPDATE", on_guild_role_update;
            GuildRoleDelete => "GUILD_ROLE_DELETE", on_guild_role_delete;
            IntegrationCreate => "INTEGRATION_CREATE", on_integration_create;
            IntegrationUpdate => "INTEGRATION_UPDATE", on_integration_update;
            IntegrationDelete => "INTEGRATION_DELETE", on_integration_delete;
            InteractionCreate => "INTERACTION_CREATE", on_interaction_create;
            InviteCreate => "INVITE_CREATE", on_invite_create;
            InviteDelete => "INVITE_DELETE", on_invite_delete;
            MessageCreate => "MESSAGE_CREATE", on_message_create;
            MessageUpdate => "MESSAGE_UPDATE", on_message_update;
            MessageDelete => "MESSAGE_DELETE", on_message_delete;
            MessageDeleteBulk => "MESSAGE_DELETE_BULK", on_message_delete_bulk;
            MessageReactionAdd => "MESSAGE_REACTION_ADD", on_message_reaction_add;
            MessageReactionRemove => "MESSAGE_REACTION_REMOVE", on_message_reaction_remove;
            MessageReactionRemoveAll => "MESSAGE_REACTION_REMOVE_ALL", on_message_reaction_remove_all;
            MessageReactionRemoveEmoji => "MESSAGE_REACTION_REMOVE_EMOJI", on_message_reaction_remove_emoji;
            PresenceUpdate => "PRESENCE_UPDATE", on_presence_update;
            StageInstanceCreate => "STAGE_INSTANCE_CREATE", on_stage_instance_create;
            StageInstanceUpdate => "STAGE_INSTANCE_UPDATE", on_stage_instance_update;
            StageInstanceDelete => "STAGE_INSTANCE_DELETE", on_stage_instance_delete;
            TypingStart => "TYPING_START", on_typing_start;
            UserUpdate => "USER_UPDATE", on_user_update;
            VoiceStateUpdate => "VOICE_STATE_UPDATE", on_voice_state_update;
            VoiceServerUpdate => "VOICE_SERVER_UPDATE", on_voice_server_update;
            WebhooksUpdate => "WEBHOOKS_UPDATE", on_webhooks_update;
        }
    };
}

macro_rules! define_event_kinds {
    ($($variant:ident => $name:literal, $hook:ident;)*) => {
        /// A dispatch event type (the `t` field of an opcode-0 frame).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventKind {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )*
        }

        impl EventKind {
            /// Every known kind, in declaration order.
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant),*];

            /// Returns the wire name.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(EventKind::$variant => $name,)*
                }
            }

            /// Returns the name of the built-in hook method for this kind.
            pub fn hook_name(self) -> &'static str {
                match self {
                    $(EventKind::$variant => stringify!($hook),)*
                }
            }
        }

        impl FromStr for EventKind {
            type Err = UnknownEventKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(EventKind::$variant),)*
                    other => Err(UnknownEventKind(other.to_string())),
                }
            }
        }
    };
}

for_each_event_kind!(define_event_kinds);

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name that is not a known dispatch event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind(pub String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

// =============================================================================
// Decoded Events
// =============================================================================

/// The typed payload of a decoded event.
#[derive(Debug, Clone)]
pub enum EventData {
    /// `READY`.
    Ready(Box<Ready>),
    /// `RESUMED`; carries no payload.
    Resumed,
    /// `INTERACTION_CREATE`.
    Interaction(Box<Interaction>),
    /// `MESSAGE_CREATE` and `MESSAGE_UPDATE`.
    Message(Box<Message>),
    /// `GUILD_CREATE` and `GUILD_UPDATE`.
    Guild(Box<Guild>),
    /// `TYPING_START`.
    TypingStart(TypingStart),
    /// `USER_UPDATE`.
    User(User),
    /// Any other known kind, passed through untouched.
    Raw,
}

/// A decoded dispatch event.
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Typed payload, if the kind has one.
    pub data: EventData,
    /// The original `d` payload.
    pub raw: Value,
}

impl GatewayEvent {
    /// Returns the interaction for `INTERACTION_CREATE`.
    pub fn interaction(&self) -> Option<&Interaction> {
        match &self.data {
            EventData::Interaction(interaction) => Some(interaction),
            _ => None,
        }
    }

    /// Returns the message for `MESSAGE_CREATE` / `MESSAGE_UPDATE`.
    pub fn message(&self) -> Option<&Message> {
        match &self.data {
            EventData::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the READY payload.
    pub fn ready(&self) -> Option<&Ready> {
        match &self.data {
            EventData::Ready(ready) => Some(ready),
            _ => None,
        }
    }
}

/// Decodes a dispatch envelope.
///
/// Returns `Ok(None)` for event types this client does not know; those are
/// logged at error level and must not be routed. A known type whose payload
/// does not parse is an `Err`.
pub fn decode(event_type: &str, payload: &Value) -> DecodeResult<Option<GatewayEvent>> {
    let Ok(kind) = event_type.parse::<EventKind>() else {
        error!(event_type = %event_type, "Unknown gateway event type, skipping");
        return Ok(None);
    };

    let data = match kind {
        EventKind::Ready => EventData::Ready(Box::new(Ready::parse(payload)?)),
        EventKind::Resumed => EventData::Resumed,
        EventKind::InteractionCreate => {
            EventData::Interaction(Box::new(Interaction::parse(payload)?))
        }
        EventKind::MessageCreate | EventKind::MessageUpdate => {
            EventData::Message(Box::new(Message::parse(payload)?))
        }
        EventKind::GuildCreate | EventKind::GuildUpdate => {
            EventData::Guild(Box::new(Guild::parse(payload)?))
        }
        EventKind::TypingStart => EventData::TypingStart(TypingStart::parse(payload)?),
        EventKind::UserUpdate => EventData::User(User::parse(payload)?),
        _ => EventData::Raw,
    };

    Ok(Some(GatewayEvent {
        kind,
        data,
        raw: payload.clone(),
    }))
}
