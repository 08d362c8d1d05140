//! The client facade.
//!
//! [`TetherClient`] wires a [`Session`], an [`EventRouter`], an
//! [`InteractionDispatcher`] and a [`GatewaySession`] together and runs them
//! until a shutdown signal arrives.
//!
//! ```rust,ignore
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//!
//! let client = TetherClient::from_config(&config)?;
//! client.register_global_command("ping", |ctx: InteractionContext| async move {
//!     ctx.respond(MessagePayload::text("pong")).await
//! }, None);
//! client.run().await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use tether_core::{BoxedConnector, BoxedRestClient, EventKind, Id, Intents, Session};
use tether_framework::{
    Client, DispatchResult, EventHooks, EventRouter, IntoCallback, IntoEventHandler,
    InteractionDispatcher, NoHooks,
};

#[cfg(all(feature = "http-client", feature = "ws-client"))]
use crate::config::{ConfigError, TetherConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::gateway::{GatewayOptions, GatewaySession};

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A gateway client: session, router, dispatcher and supervisor.
pub struct TetherClient {
    client: Client,
    router: Arc<EventRouter>,
    gateway: GatewaySession,
    sweep_interval: Duration,
    shutdown_grace: Duration,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    running: AtomicBool,
}

impl TetherClient {
    /// Starts building a client for `application_id`.
    pub fn builder(token: impl Into<String>, application_id: Id) -> TetherClientBuilder {
        TetherClientBuilder::new(token, application_id)
    }

    /// Builds a client with the HTTP REST client and WebSocket connector.
    #[cfg(all(feature = "http-client", feature = "ws-client"))]
    pub fn from_config(config: &TetherConfig) -> RuntimeResult<Self> {
        use tether_transport::{HttpClientConfig, HttpRestClient, WsConnector};

        validate_config(config)?;
        let gateway = &config.gateway;

        let mut http = HttpClientConfig::new(gateway.token.clone(), gateway.application_id())
            .with_api_base(gateway.api_base.clone())
            .with_timeout(gateway.request_timeout());
        http.max_rate_limit_attempts = gateway.max_rate_limit_attempts;
        let rest = HttpRestClient::new(http)?;

        Self::builder(gateway.token.clone(), gateway.application_id())
            .with_intents(gateway.intents())
            .with_rest(Arc::new(rest))
            .with_connector(Arc::new(WsConnector::new()))
            .with_gateway_options(GatewayOptions::from(gateway))
            .with_custom_id_ttl(config.interactions.custom_id_ttl())
            .with_sweep_interval(config.interactions.sweep_interval())
            .build()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn session(&self) -> &Arc<Session> {
        self.gateway.session()
    }

    pub fn dispatcher(&self) -> &Arc<InteractionDispatcher> {
        self.client.dispatcher()
    }

    /// Token that stops the client when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Appends a handler for every event of `kind`.
    pub fn register_event_handler<T>(&self, kind: EventKind, handler: impl IntoEventHandler<T>) {
        self.router.register_event_handler(kind, handler);
    }

    /// Registers a global command; passing the id skips the first lookup.
    pub fn register_global_command<T>(
        &self,
        name: impl Into<String>,
        callback: impl IntoCallback<T>,
        id: Option<Id>,
    ) {
        self.dispatcher().register_global_command(name, callback, id);
    }

    /// Registers a guild command; `guild: None` matches every guild.
    pub fn register_guild_command<T>(
        &self,
        name: impl Into<String>,
        callback: impl IntoCallback<T>,
        guild: Option<Id>,
        id: Option<Id>,
    ) {
        self.dispatcher().register_guild_command(name, callback, guild, id);
    }

    pub fn register_custom_id<T>(
        &self,
        custom_id: impl Into<String>,
        callback: impl IntoCallback<T>,
        unlimited: bool,
    ) {
        self.dispatcher().register_custom_id(custom_id, callback, unlimited);
    }

    /// Registers a component callback and returns its generated custom id.
    pub fn register_component<T>(&self, callback: impl IntoCallback<T>, unlimited: bool) -> String {
        self.dispatcher().register_component(callback, unlimited)
    }

    pub fn unregister_custom_id(&self, custom_id: &str, not_exists_ok: bool) -> DispatchResult<()> {
        self.dispatcher().unregister_custom_id(custom_id, not_exists_ok)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Runs until Ctrl+C, SIGTERM or a fatal gateway error.
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("Tether client is now running. Press Ctrl+C to stop.");
        self.run_until(wait_for_signal()).await
    }

    /// Runs until `shutdown` completes, the shutdown token is cancelled, or
    /// the gateway fails.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("Client is already running");
            return Ok(());
        }

        let sweeper = self
            .dispatcher()
            .spawn_custom_id_sweeper(self.sweep_interval, self.shutdown.child_token());

        let gateway = self.gateway.run();
        tokio::pin!(gateway);

        let result = tokio::select! {
            result = &mut gateway => result,
            _ = shutdown => {
                self.shutdown.cancel();
                gateway.await
            }
        };

        self.stop().await;
        sweeper.abort();
        self.running.store(false, Ordering::Release);

        if let Err(e) = &result {
            error!(error = %e, "Client stopped with an error");
        }
        result.map_err(RuntimeError::from)
    }

    /// Cancels the session and waits briefly for in-flight routing tasks.
    pub async fn stop(&self) {
        info!("Stopping Tether client");
        self.shutdown.cancel();
        self.tracker.close();

        let pending = self.tracker.len();
        if pending > 0 {
            debug!(pending, "Waiting for routing tasks");
        }
        if tokio::time::timeout(self.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                pending = self.tracker.len(),
                grace_ms = self.shutdown_grace.as_millis() as u64,
                "Routing tasks still running after shutdown grace period"
            );
        }
        info!("Tether client stopped");
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        info!("Received Ctrl+C, shutting down");
    }
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`TetherClient`].
pub struct TetherClientBuilder {
    token: String,
    application_id: Id,
    intents: Intents,
    rest: Option<BoxedRestClient>,
    connector: Option<BoxedConnector>,
    hooks: Arc<dyn EventHooks>,
    options: GatewayOptions,
    custom_id_ttl: Option<Duration>,
    sweep_interval: Duration,
    shutdown_grace: Duration,
    shutdown: Option<CancellationToken>,
}

impl TetherClientBuilder {
    pub fn new(token: impl Into<String>, application_id: Id) -> Self {
        Self {
            token: token.into(),
            application_id,
            intents: Intents::non_privileged(),
            rest: None,
            connector: None,
            hooks: Arc::new(NoHooks),
            options: GatewayOptions::default(),
            custom_id_ttl: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            shutdown: None,
        }
    }

    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    pub fn with_rest(mut self, rest: BoxedRestClient) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn with_connector(mut self, connector: BoxedConnector) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replaces the built-in per-kind hooks.
    pub fn with_hooks(mut self, hooks: impl EventHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn with_gateway_options(mut self, options: GatewayOptions) -> Self {
        self.options = options;
        self
    }

    /// Lifetime of every registered custom id, counted from registration.
    ///
    /// `unlimited` only makes an id reusable; it still expires.
    pub fn with_custom_id_ttl(mut self, ttl: Duration) -> Self {
        self.custom_id_ttl = Some(ttl);
        self
    }

    /// Period of the expired custom-id sweep. Must be non-zero.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// How long [`TetherClient::stop`] waits for routing tasks.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Uses an external token to stop the client.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn build(self) -> RuntimeResult<TetherClient> {
        let rest = self
            .rest
            .ok_or(RuntimeError::MissingCollaborator("REST client"))?;
        let connector = self
            .connector
            .ok_or(RuntimeError::MissingCollaborator("gateway connector"))?;
        if self.sweep_interval.is_zero() {
            return Err(
                ConfigError::validation("Custom id sweep interval must be greater than 0").into(),
            );
        }

        let dispatcher = Arc::new(match self.custom_id_ttl {
            Some(ttl) => InteractionDispatcher::with_custom_id_ttl(ttl),
            None => InteractionDispatcher::new(),
        });
        let session = Arc::new(Session::new(self.token, self.application_id, self.intents));
        let client = Client::new(self.application_id, Arc::clone(&rest), dispatcher);
        let router = Arc::new(
            EventRouter::new(Arc::clone(&session), client.clone()).with_shared_hooks(self.hooks),
        );

        let shutdown = self.shutdown.unwrap_or_default();
        let tracker = TaskTracker::new();
        let gateway =
            GatewaySession::new(session, rest, connector, Arc::clone(&router), self.options)
                .with_tracker(tracker.clone())
                .with_shutdown(shutdown.clone());

        debug!(application_id = %self.application_id, "Tether client built");
        Ok(TetherClient {
            client,
            router,
            gateway,
            sweep_interval: self.sweep_interval,
            shutdown_grace: self.shutdown_grace,
            shutdown,
            tracker,
            running: AtomicBool::new(false),
        })
    }
}
