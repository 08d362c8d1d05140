//! Thin data-model collaborators.
//!
//! The core only relies on two narrow contracts from its entities:
//!
//! - [`Entity::parse`]: raw JSON payload to a typed object.
//! - [`Sendable::to_wire`]: typed object back to a raw payload.
//!
//! The structs here carry the handful of fields the gateway and dispatch
//! engine actually read (`id`, `name`, `guild_id`, `custom_id`, the command
//! id and the interaction token); everything else stays in the raw payload.

mod gateway;
mod guild;
mod id;
mod interaction;
mod message;
mod user;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DecodeError, DecodeResult};

pub use gateway::{Hello, PartialApplication, Ready, TypingStart};
pub use guild::Guild;
pub use id::Id;
pub use interaction::{
    ApplicationCommand, AutocompleteChoice, Interaction, InteractionData, InteractionResponse,
    InteractionType, ResponseKind,
};
pub use message::{Message, MessageFlags, MessagePayload};
pub use user::User;

/// An entity that can be parsed from a raw gateway or REST payload.
pub trait Entity: Sized {
    /// Name used in error messages.
    const NAME: &'static str;

    /// Parses the entity from raw JSON.
    fn parse(raw: &Value) -> DecodeResult<Self>;
}

/// An entity that can be sent back over the wire.
pub trait Sendable {
    /// Converts the entity into its raw JSON payload.
    fn to_wire(&self) -> Value;
}

/// Shared serde-backed parse used by the entity implementations.
pub(crate) fn parse_with_serde<T: DeserializeOwned>(
    entity: &'static str,
    raw: &Value,
) -> DecodeResult<T> {
    T::deserialize(raw).map_err(|e| DecodeError::entity(entity, e))
}

/// Shared serde-backed wire conversion.
pub(crate) fn wire_with_serde<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

macro_rules! impl_entity {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl $crate::model::Entity for $ty {
                const NAME: &'static str = $name;

                fn parse(raw: &serde_json::Value) -> $crate::error::DecodeResult<Self> {
                    $crate::model::parse_with_serde($name, raw)
                }
            }
        )*
    };
}

pub(crate) use impl_entity;
