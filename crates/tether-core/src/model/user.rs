//! User entity.

use serde::{Deserialize, Serialize};

use super::Id;

/// A user account as embedded in READY, messages and interactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: Id,
    /// Username.
    pub username: String,
    /// Legacy discriminator, `"0"` for migrated accounts.
    #[serde(default)]
    pub discriminator: Option<String>,
    /// Whether the account belongs to an application.
    #[serde(default)]
    pub bot: bool,
}

super::impl_entity!(User => "user");
