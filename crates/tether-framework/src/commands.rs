//! Application command registry and resolution.
//!
//! Commands are registered by name, optionally with a known id. An incoming
//! command interaction only carries the command id, so resolution cascades:
//!
//! 1. `by_id`: no network call.
//! 2. Global lookup over REST, then `by_global_name`.
//! 3. Guild lookup over REST (needs the interaction's guild id), then
//!    `by_guild_name[(name, guild)]`, then `by_guild_name[(name, any guild)]`.
//!
//! A hit in tier 2 or 3 is promoted into `by_id`, so the next interaction for
//! the same command makes no REST call.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, trace};

use tether_core::model::Interaction;
use tether_core::{ApiError, Id, RestClient};

use crate::callback::Callback;
use crate::error::{DispatchError, DispatchResult};

#[derive(Default)]
struct CommandTables {
    by_id: HashMap<Id, Callback>,
    by_global_name: HashMap<String, Callback>,
    by_guild_name: HashMap<(String, Option<Id>), Callback>,
}

/// A resolved command callback.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub callback: Callback,
    /// Name the command was resolved under, when a lookup provided one.
    pub name: Option<String>,
}

/// The three command tables, guarded by one mutex.
#[derive(Default)]
pub struct CommandRegistry {
    tables: Mutex<CommandTables>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a global command by name, and by id when known.
    pub fn register_global(&self, name: impl Into<String>, callback: Callback, id: Option<Id>) {
        let name = name.into();
        debug!(command = %name, id = ?id, "Registering global command");
        let mut tables = self.tables.lock();
        if let Some(id) = id {
            tables.by_id.insert(id, callback.clone());
        }
        tables.by_global_name.insert(name, callback);
    }

    /// Registers a guild command. `guild: None` matches any guild.
    pub fn register_guild(
        &self,
        name: impl Into<String>,
        callback: Callback,
        guild: Option<Id>,
        id: Option<Id>,
    ) {
        let name = name.into();
        debug!(command = %name, guild = ?guild, id = ?id, "Registering guild command");
        let mut tables = self.tables.lock();
        if let Some(id) = id {
            tables.by_id.insert(id, callback.clone());
        }
        tables.by_guild_name.insert((name, guild), callback);
    }

    /// Returns true if `id` resolves without a REST call.
    pub fn is_cached(&self, id: Id) -> bool {
        self.tables.lock().by_id.contains_key(&id)
    }

    fn by_id(&self, id: Id) -> Option<Callback> {
        self.tables.lock().by_id.get(&id).cloned()
    }

    fn promote_global(&self, id: Id, name: &str) -> Option<Callback> {
        let mut tables = self.tables.lock();
        let callback = tables.by_global_name.get(name).cloned()?;
        tables.by_id.insert(id, callback.clone());
        Some(callback)
    }

    fn promote_guild(&self, id: Id, name: &str, guild: Id) -> Option<Callback> {
        let mut tables = self.tables.lock();
        let callback = tables
            .by_guild_name
            .get(&(name.to_string(), Some(guild)))
            .or_else(|| tables.by_guild_name.get(&(name.to_string(), None)))
            .cloned()?;
        tables.by_id.insert(id, callback.clone());
        Some(callback)
    }

    /// Resolves the callback for a command interaction.
    pub async fn resolve(
        &self,
        interaction: &Interaction,
        rest: &dyn RestClient,
    ) -> DispatchResult<ResolvedCommand> {
        let command_id = interaction
            .command_id()
            .ok_or(DispatchError::MissingField { field: "data.id" })?;

        if let Some(callback) = self.by_id(command_id) {
            trace!(command_id = %command_id, "Command resolved from id cache");
            return Ok(ResolvedCommand {
                callback,
                name: interaction.command_name().map(str::to_string),
            });
        }

        match rest.get_application_command(command_id).await {
            Ok(command) => {
                if let Some(callback) = self.promote_global(command_id, &command.name) {
                    debug!(command_id = %command_id, command = %command.name, "Resolved global command");
                    return Ok(ResolvedCommand {
                        callback,
                        name: Some(command.name),
                    });
                }
            }
            Err(ApiError::Http { status: 404, .. }) => {
                trace!(command_id = %command_id, "Not a global command");
            }
            Err(e) => return Err(e.into()),
        }

        let guild_id = interaction
            .guild_id
            .ok_or(DispatchError::MissingGuild { command_id })?;

        let command = match rest.get_guild_application_command(guild_id, command_id).await {
            Ok(command) => command,
            Err(ApiError::Http { status: 404, .. }) => {
                return Err(DispatchError::CommandNotFound {
                    command_id,
                    name: interaction.command_name().map(str::to_string),
                });
            }
            Err(e) => return Err(e.into()),
        };

        match self.promote_guild(command_id, &command.name, guild_id) {
            Some(callback) => {
                debug!(command_id = %command_id, command = %command.name, guild_id = %guild_id, "Resolved guild command");
                Ok(ResolvedCommand {
                    callback,
                    name: Some(command.name),
                })
            }
            None => Err(DispatchError::CommandNotFound {
                command_id,
                name: Some(command.name),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::IntoCallback;
    use crate::testing::{FakeRest, command_interaction};

    fn noop() -> Callback {
        (|| async {}).into_callback()
    }

    #[tokio::test]
    async fn test_cached_id_makes_no_rest_call() {
        let registry = CommandRegistry::new();
        registry.register_global("ping", noop(), Some(Id(40)));
        let rest = FakeRest::default();

        registry
            .resolve(&command_interaction(40, None), &rest)
            .await
            .unwrap();
        assert_eq!(rest.lookup_calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_global_hit_is_promoted() {
        let registry = CommandRegistry::new();
        registry.register_global("ping", noop(), None);
        let rest = FakeRest::default().with_global_command(40, "ping");
        let interaction = command_interaction(40, None);

        let resolved = registry.resolve(&interaction, &rest).await.unwrap();
        assert_eq!(resolved.name.as_deref(), Some("ping"));
        assert_eq!(rest.lookup_calls(), (1, 0));
        assert!(registry.is_cached(Id(40)));

        registry.resolve(&interaction, &rest).await.unwrap();
        assert_eq!(rest.lookup_calls(), (1, 0));
    }

    #[tokio::test]
    async fn test_guild_specific_then_any_guild() {
        let registry = CommandRegistry::new();
        registry.register_guild("ban", noop(), Some(Id(30)), None);
        registry.register_guild("kick", noop(), None, None);
        let rest = FakeRest::default()
            .with_guild_command(30, 41, "ban")
            .with_guild_command(31, 42, "kick");

        let resolved = registry
            .resolve(&command_interaction(41, Some(30)), &rest)
            .await
            .unwrap();
        assert_eq!(resolved.name.as_deref(), Some("ban"));

        let resolved = registry
            .resolve(&command_interaction(42, Some(31)), &rest)
            .await
            .unwrap();
        assert_eq!(resolved.name.as_deref(), Some("kick"));

        // One global and one guild lookup per command, then cached.
        assert_eq!(rest.lookup_calls(), (2, 2));
        registry
            .resolve(&command_interaction(41, Some(30)), &rest)
            .await
            .unwrap();
        assert_eq!(rest.lookup_calls(), (2, 2));
    }

    #[tokio::test]
    async fn test_guild_registration_does_not_leak_to_other_guilds() {
        let registry = CommandRegistry::new();
        registry.register_guild("ban", noop(), Some(Id(30)), None);
        let rest = FakeRest::default().with_guild_command(31, 41, "ban");

        let err = registry
            .resolve(&command_interaction(41, Some(31)), &rest)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::CommandNotFound { command_id: Id(41), .. }));
    }

    #[tokio::test]
    async fn test_unresolvable_command_is_a_lookup_error() {
        let registry = CommandRegistry::new();
        registry.register_global("ping", noop(), None);
        let rest = FakeRest::default();

        let err = registry
            .resolve(&command_interaction(99, Some(30)), &rest)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::CommandNotFound { command_id: Id(99), .. }));
        assert_eq!(rest.lookup_calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_global_lookup_failure_is_propagated() {
        let registry = CommandRegistry::new();
        registry.register_global("ping", noop(), None);
        let rest = FakeRest::default().fail_global_lookups_with(500);

        let err = registry
            .resolve(&command_interaction(40, Some(30)), &rest)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Api(ApiError::Http { status: 500, .. })));
        assert_eq!(rest.lookup_calls(), (1, 0));
        assert!(!registry.is_cached(Id(40)));
    }

    #[tokio::test]
    async fn test_guild_tier_needs_guild_id() {
        let registry = CommandRegistry::new();
        let rest = FakeRest::default();

        let err = registry
            .resolve(&command_interaction(99, None), &rest)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingGuild { command_id: Id(99) }));
        assert_eq!(rest.lookup_calls(), (1, 0));
    }
}
