//! Interaction entities and response payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Id, Sendable, User};

/// Interaction type tag (`type` field of an interaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum InteractionType {
    /// Health check; only delivered to HTTP endpoints.
    Ping,
    /// A slash, user or message command invocation.
    ApplicationCommand,
    /// A button or select menu activation.
    MessageComponent,
    /// Autocomplete request for a command option.
    ApplicationCommandAutocomplete,
    /// A modal form submission.
    ModalSubmit,
    /// A type this client does not know about.
    Unknown(u8),
}

impl From<u8> for InteractionType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::MessageComponent,
            4 => Self::ApplicationCommandAutocomplete,
            5 => Self::ModalSubmit,
            other => Self::Unknown(other),
        }
    }
}

impl From<InteractionType> for u8 {
    fn from(value: InteractionType) -> Self {
        match value {
            InteractionType::Ping => 1,
            InteractionType::ApplicationCommand => 2,
            InteractionType::MessageComponent => 3,
            InteractionType::ApplicationCommandAutocomplete => 4,
            InteractionType::ModalSubmit => 5,
            InteractionType::Unknown(other) => other,
        }
    }
}

/// The `data` object of an interaction.
///
/// Command interactions populate `id` and `name`; component and modal
/// interactions populate `custom_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionData {
    /// Command id.
    #[serde(default)]
    pub id: Option<Id>,
    /// Command name.
    #[serde(default)]
    pub name: Option<String>,
    /// Guild the command is registered in, for guild commands.
    #[serde(default)]
    pub guild_id: Option<Id>,
    /// Developer-defined component identifier.
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Component type for component interactions.
    #[serde(default)]
    pub component_type: Option<u8>,
    /// Selected values for select menus.
    #[serde(default)]
    pub values: Vec<String>,
    /// Command options, kept raw.
    #[serde(default)]
    pub options: Vec<Value>,
}

/// An `INTERACTION_CREATE` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Interaction id.
    pub id: Id,
    /// Application the interaction is for.
    pub application_id: Id,
    /// Interaction type.
    #[serde(rename = "type")]
    pub kind: InteractionType,
    /// Type-specific data.
    #[serde(default)]
    pub data: Option<InteractionData>,
    /// Guild it was sent from.
    #[serde(default)]
    pub guild_id: Option<Id>,
    /// Channel it was sent from.
    #[serde(default)]
    pub channel_id: Option<Id>,
    /// Continuation token for responding (valid for ~15 minutes).
    pub token: String,
    /// Invoking user outside guilds.
    #[serde(default)]
    pub user: Option<User>,
    /// Invoking member inside guilds, kept raw.
    #[serde(default)]
    pub member: Option<Value>,
    /// Message the component was attached to, kept raw.
    #[serde(default)]
    pub message: Option<Value>,
}

impl Interaction {
    /// Returns the invoked command id, if this is a command interaction.
    pub fn command_id(&self) -> Option<Id> {
        self.data.as_ref().and_then(|d| d.id)
    }

    /// Returns the invoked command name, if present.
    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.name.as_deref())
    }

    /// Returns the component custom id, if present.
    pub fn custom_id(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.custom_id.as_deref())
    }
}

/// An application command as returned by the REST lookup endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationCommand {
    /// Command id.
    pub id: Id,
    /// Owning application.
    #[serde(default)]
    pub application_id: Option<Id>,
    /// Guild the command is scoped to; absent for global commands.
    #[serde(default)]
    pub guild_id: Option<Id>,
    /// Command name.
    pub name: String,
    /// Command description.
    #[serde(default)]
    pub description: String,
}

super::impl_entity!(
    Interaction => "interaction",
    ApplicationCommand => "application command",
);

// =============================================================================
// Responses
// =============================================================================

/// Interaction callback type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Acknowledge a ping.
    Pong,
    /// Respond with a message.
    ChannelMessage,
    /// Acknowledge now, edit the original response later.
    DeferredChannelMessage,
    /// Acknowledge a component interaction, edit the message later.
    DeferredUpdateMessage,
    /// Edit the message the component was attached to.
    UpdateMessage,
    /// Return autocomplete choices.
    AutocompleteResult,
    /// Open a modal.
    Modal,
}

impl ResponseKind {
    /// Returns the wire value of this callback type.
    pub fn code(self) -> u8 {
        match self {
            Self::Pong => 1,
            Self::ChannelMessage => 4,
            Self::DeferredChannelMessage => 5,
            Self::DeferredUpdateMessage => 6,
            Self::UpdateMessage => 7,
            Self::AutocompleteResult => 8,
            Self::Modal => 9,
        }
    }

    /// Returns true for the deferred acknowledgement kinds.
    pub fn is_deferred(self) -> bool {
        matches!(
            self,
            Self::DeferredChannelMessage | Self::DeferredUpdateMessage
        )
    }
}

/// A single autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteChoice {
    /// Displayed name.
    pub name: String,
    /// Value submitted when picked.
    pub value: Value,
}

/// An interaction callback body.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionResponse {
    /// Callback type.
    pub kind: ResponseKind,
    /// Callback data; omitted when `None`.
    pub data: Option<Value>,
}

impl Sendable for InteractionResponse {
    fn to_wire(&self) -> Value {
        match &self.data {
            Some(data) => json!({ "type": self.kind.code(), "data": data }),
            None => json!({ "type": self.kind.code() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;

    #[test]
    fn test_parse_command_interaction() {
        let raw = json!({
            "id": "10",
            "application_id": "20",
            "type": 2,
            "token": "tok",
            "guild_id": "30",
            "data": {"id": "40", "name": "ping", "type": 1}
        });
        let interaction = Interaction::parse(&raw).unwrap();
        assert_eq!(interaction.kind, InteractionType::ApplicationCommand);
        assert_eq!(interaction.command_id(), Some(Id(40)));
        assert_eq!(interaction.command_name(), Some("ping"));
        assert_eq!(interaction.guild_id, Some(Id(30)));
        assert_eq!(interaction.custom_id(), None);
    }

    #[test]
    fn test_parse_component_interaction() {
        let raw = json!({
            "id": "10",
            "application_id": "20",
            "type": 3,
            "token": "tok",
            "data": {"custom_id": "abc", "component_type": 2}
        });
        let interaction = Interaction::parse(&raw).unwrap();
        assert_eq!(interaction.kind, InteractionType::MessageComponent);
        assert_eq!(interaction.custom_id(), Some("abc"));
    }

    #[test]
    fn test_unknown_interaction_type_is_preserved() {
        assert_eq!(InteractionType::from(42), InteractionType::Unknown(42));
        assert_eq!(u8::from(InteractionType::Unknown(42)), 42);
    }

    #[test]
    fn test_response_wire_shape() {
        let deferred = InteractionResponse {
            kind: ResponseKind::DeferredChannelMessage,
            data: None,
        };
        assert_eq!(deferred.to_wire(), json!({"type": 5}));
        assert!(ResponseKind::DeferredChannelMessage.is_deferred());
        assert!(!ResponseKind::ChannelMessage.is_deferred());

        let message = InteractionResponse {
            kind: ResponseKind::ChannelMessage,
            data: Some(json!({"content": "pong"})),
        };
        assert_eq!(
            message.to_wire(),
            json!({"type": 4, "data": {"content": "pong"}})
        );
    }
}
