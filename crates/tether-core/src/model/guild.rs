//! Guild entity.

use serde::{Deserialize, Serialize};

use super::Id;

/// The identifying slice of a guild payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    /// Guild id.
    pub id: Id,
    /// Guild name; absent for unavailable guilds.
    #[serde(default)]
    pub name: Option<String>,
    /// Set while the guild is in an outage.
    #[serde(default)]
    pub unavailable: bool,
}

super::impl_entity!(Guild => "guild");
