//! Interaction dispatch.
//!
//! The [`InteractionDispatcher`] owns the command tables and the custom-id
//! registry. It is constructed explicitly and handed to the client, so two
//! clients in one process never share registrations.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span};

use tether_core::Id;
use tether_core::model::{Interaction, InteractionType};

use crate::callback::{Callback, IntoCallback};
use crate::commands::CommandRegistry;
use crate::components::CustomIdRegistry;
use crate::context::Client;
use crate::error::{DispatchError, DispatchResult};
use crate::response::InteractionContext;

/// Owns every interaction registration and routes interactions to them.
#[derive(Default)]
pub struct InteractionDispatcher {
    commands: CommandRegistry,
    custom_ids: CustomIdRegistry,
}

impl InteractionDispatcher {
    /// Creates a dispatcher with the default custom-id lifetime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher whose custom ids live for `ttl`.
    pub fn with_custom_id_ttl(ttl: Duration) -> Self {
        Self {
            commands: CommandRegistry::new(),
            custom_ids: CustomIdRegistry::with_ttl(ttl),
        }
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn custom_ids(&self) -> &CustomIdRegistry {
        &self.custom_ids
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers a global command. Passing the id skips the first lookup.
    pub fn register_global_command<T>(
        &self,
        name: impl Into<String>,
        callback: impl IntoCallback<T>,
        id: Option<Id>,
    ) {
        self.commands.register_global(name, callback.into_callback(), id);
    }

    /// Registers a guild command; `guild: None` matches every guild.
    pub fn register_guild_command<T>(
        &self,
        name: impl Into<String>,
        callback: impl IntoCallback<T>,
        guild: Option<Id>,
        id: Option<Id>,
    ) {
        self.commands.register_guild(name, callback.into_callback(), guild, id);
    }

    /// Registers a component callback under a known custom id.
    pub fn register_custom_id<T>(
        &self,
        custom_id: impl Into<String>,
        callback: impl IntoCallback<T>,
        unlimited: bool,
    ) {
        self.custom_ids.register(custom_id, callback.into_callback(), unlimited);
    }

    /// Registers a component callback under a generated custom id.
    pub fn register_component<T>(&self, callback: impl IntoCallback<T>, unlimited: bool) -> String {
        self.custom_ids.register_generated(callback.into_callback(), unlimited)
    }

    /// Removes a component registration.
    pub fn unregister_custom_id(&self, custom_id: &str, not_exists_ok: bool) -> DispatchResult<()> {
        self.custom_ids.unregister(custom_id, not_exists_ok)
    }

    /// Periodically drops expired custom ids until `cancel` fires.
    pub fn spawn_custom_id_sweeper(
        &self,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        self.custom_ids.spawn_sweeper(period, cancel)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Routes an interaction to its callback and runs it.
    pub async fn handle_interaction(
        &self,
        interaction: Arc<Interaction>,
        raw: Value,
        client: Client,
    ) -> DispatchResult<()> {
        let span = debug_span!("interaction", id = %interaction.id, kind = ?interaction.kind);
        async move {
            match interaction.kind {
                InteractionType::ApplicationCommand
                | InteractionType::ApplicationCommandAutocomplete => {
                    self.handle_application_command(interaction, raw, client)
                        .await
                }
                InteractionType::MessageComponent | InteractionType::ModalSubmit => {
                    self.handle_component(interaction, raw, client).await
                }
                kind => Err(DispatchError::UnsupportedInteraction { kind }),
            }
        }
        .instrument(span)
        .await
    }

    /// Resolves and runs an application command or autocomplete callback.
    pub async fn handle_application_command(
        &self,
        interaction: Arc<Interaction>,
        raw: Value,
        client: Client,
    ) -> DispatchResult<()> {
        let resolved = self
            .commands
            .resolve(&interaction, client.rest().as_ref())
            .await?;
        let label = resolved
            .name
            .unwrap_or_else(|| "unnamed command".to_string());

        debug!(command = %label, "Invoking command callback");
        run(&resolved.callback, label, interaction, raw, client).await
    }

    /// Runs the callback registered for a component's custom id.
    pub async fn handle_component(
        &self,
        interaction: Arc<Interaction>,
        raw: Value,
        client: Client,
    ) -> DispatchResult<()> {
        let custom_id = interaction
            .custom_id()
            .ok_or(DispatchError::MissingField {
                field: "data.custom_id",
            })?
            .to_string();
        let entry = self.custom_ids.trigger(&custom_id)?;

        debug!(custom_id = %custom_id, unlimited = entry.unlimited, "Invoking component callback");
        run(&entry.callback, custom_id, interaction, raw, client).await
    }
}

async fn run(
    callback: &Callback,
    label: String,
    interaction: Arc<Interaction>,
    raw: Value,
    client: Client,
) -> DispatchResult<()> {
    let ctx = InteractionContext::new(interaction, client.rest().clone());
    callback
        .invoke(ctx, raw, client)
        .await
        .map_err(|e| DispatchError::callback(label, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client_with, command_interaction, component_interaction, FakeRest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tether_core::model::MessagePayload;

    fn counter() -> (
        Arc<AtomicUsize>,
        impl Fn() -> std::future::Ready<()> + Send + Sync + 'static,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        (calls, move || {
            c.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        })
    }

    #[tokio::test]
    async fn test_component_single_use() {
        let (client, _rest) = client_with(FakeRest::default());
        let (calls, callback) = counter();
        client.dispatcher().register_custom_id("abc", callback, false);

        let interaction = component_interaction("abc");
        client
            .dispatcher()
            .handle_interaction(interaction.clone(), Value::Null, client.clone())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let err = client
            .dispatcher()
            .handle_interaction(interaction, Value::Null, client.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UntrackedInteraction { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_component_unlimited() {
        let (client, _rest) = client_with(FakeRest::default());
        let (calls, callback) = counter();
        let custom_id = client.dispatcher().register_component(callback, true);

        let interaction = component_interaction(&custom_id);
        for _ in 0..4 {
            client
                .dispatcher()
                .handle_component(interaction.clone(), Value::Null, client.clone())
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        client.dispatcher().unregister_custom_id(&custom_id, false).unwrap();
        assert!(client
            .dispatcher()
            .handle_component(interaction, Value::Null, client.clone())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_command_callback_can_respond() {
        let (client, rest) = client_with(FakeRest::default().with_global_command(40, "ping"));
        client.dispatcher().register_global_command(
            "ping",
            |ctx: InteractionContext| async move {
                ctx.respond(MessagePayload::text("pong")).await?;
                Ok::<_, anyhow::Error>(())
            },
            None,
        );

        client
            .dispatcher()
            .handle_interaction(command_interaction(40, None), Value::Null, client.clone())
            .await
            .unwrap();
        assert_eq!(rest.responses().len(), 1);
    }

    #[tokio::test]
    async fn test_callback_failure_is_wrapped() {
        let (client, _rest) = client_with(FakeRest::default());
        client.dispatcher().register_global_command(
            "ping",
            |ctx: InteractionContext| async move {
                // Two responses on one interaction.
                ctx.respond(MessagePayload::text("one")).await?;
                ctx.respond(MessagePayload::text("two")).await?;
                Ok::<_, anyhow::Error>(())
            },
            Some(Id(40)),
        );

        let err = client
            .dispatcher()
            .handle_interaction(command_interaction(40, None), Value::Null, client.clone())
            .await
            .unwrap_err();
        match err {
            DispatchError::Callback { target, source } => {
                assert_eq!(target, "ping");
                assert!(source.to_string().contains("already been generated"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unresolved_command_is_surfaced() {
        let (client, _rest) = client_with(FakeRest::default());
        let err = client
            .dispatcher()
            .handle_application_command(
                command_interaction(77, Some(30)),
                Value::Null,
                client.clone(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::CommandNotFound { .. }));
    }

    #[test]
    fn test_dispatchers_are_independent() {
        let a = InteractionDispatcher::new();
        let b = InteractionDispatcher::new();
        a.register_custom_id("abc", || async {}, false);
        assert!(a.custom_ids().contains("abc"));
        assert!(!b.custom_ids().contains("abc"));
    }
}
