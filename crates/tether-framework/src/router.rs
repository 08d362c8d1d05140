//! Event routing.
//!
//! Every dispatch frame is decoded and fanned out in a fixed order:
//!
//! 1. READY gate: until the session is ready, only READY and RESUMED pass.
//! 2. The built-in hook for the event kind, then [`EventHooks::on_any`].
//! 3. Registered handlers for the kind, in registration order.
//! 4. For `INTERACTION_CREATE`, the [`InteractionDispatcher`](crate::InteractionDispatcher).
//!
//! Handlers for one event run strictly in that order. Different events are
//! routed on independent tasks and have no ordering between them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{Instrument, debug, debug_span, error, trace, warn};

use tether_core::{EventData, EventKind, GatewayEvent, Session, decode};

use crate::callback::IntoCallbackResult;
use crate::context::Client;
use crate::error::DispatchError;

// ============================================================================
// Built-in hooks
// ============================================================================

macro_rules! define_hooks {
    ($($variant:ident => $name:literal, $hook:ident;)*) => {
        /// Built-in per-event hooks.
        ///
        /// Every method defaults to a no-op; implement the ones you need.
        /// [`on_any`](EventHooks::on_any) runs after the specific hook for
        /// every routed event.
        #[async_trait]
        pub trait EventHooks: Send + Sync + 'static {
            $(
                #[doc = concat!("Called for `", $name, "`.")]
                async fn $hook(&self, _event: &GatewayEvent, _client: &Client) {}
            )*

            /// Called for every routed event.
            async fn on_any(&self, _event: &GatewayEvent, _client: &Client) {}

            /// Called when an interaction could not be dispatched or its
            /// callback failed.
            async fn on_dispatch_error(&self, event: &GatewayEvent, error: &DispatchError) {
                error!(event = %event.kind, error = %error, "Interaction dispatch failed");
            }
        }

        async fn call_hook(hooks: &dyn EventHooks, event: &GatewayEvent, client: &Client) {
            match event.kind {
                $(EventKind::$variant => hooks.$hook(event, client).await,)*
            }
        }
    };
}

tether_core::for_each_event_kind!(define_hooks);

/// Hooks that do nothing beyond the defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl EventHooks for NoHooks {}

// ============================================================================
// Registered handlers
// ============================================================================

type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A registered event handler.
#[derive(Clone)]
pub struct EventHandler {
    func: Arc<dyn Fn(Arc<GatewayEvent>, Client) -> HandlerFuture + Send + Sync>,
    blocking: bool,
}

impl EventHandler {
    /// Wraps a synchronous handler. It runs inline on the routing task and
    /// logs a warning each time it is invoked.
    pub fn blocking<F, Res>(f: F) -> Self
    where
        F: Fn(&GatewayEvent, &Client) -> Res + Send + Sync + 'static,
        Res: IntoCallbackResult + 'static,
    {
        Self {
            func: Arc::new(move |event: Arc<GatewayEvent>, client: Client| {
                let result = f(&event, &client).into_callback_result();
                futures::future::ready(result).boxed()
            }),
            blocking: true,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }
}

/// Conversion of async functions into an [`EventHandler`].
pub trait IntoEventHandler<T>: Send + Sync + 'static {
    fn into_event_handler(self) -> EventHandler;
}

impl IntoEventHandler<EventHandler> for EventHandler {
    fn into_event_handler(self) -> EventHandler {
        self
    }
}

impl<F, Fut, Res> IntoEventHandler<(Arc<GatewayEvent>,)> for F
where
    F: Fn(Arc<GatewayEvent>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoCallbackResult + 'static,
{
    fn into_event_handler(self) -> EventHandler {
        EventHandler {
            func: Arc::new(move |event: Arc<GatewayEvent>, _client: Client| {
                let fut = self(event);
                async move { fut.await.into_callback_result() }.boxed()
            }),
            blocking: false,
        }
    }
}

impl<F, Fut, Res> IntoEventHandler<(Arc<GatewayEvent>, Client)> for F
where
    F: Fn(Arc<GatewayEvent>, Client) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoCallbackResult + 'static,
{
    fn into_event_handler(self) -> EventHandler {
        EventHandler {
            func: Arc::new(move |event: Arc<GatewayEvent>, client: Client| {
                let fut = self(event, client);
                async move { fut.await.into_callback_result() }.boxed()
            }),
            blocking: false,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// What happened to a dispatch frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The event type is unknown; nothing was routed.
    Unknown,
    /// The payload did not parse; nothing was routed.
    Malformed,
    /// The event arrived before READY and was dropped.
    NotReady,
    /// Hooks and handlers ran (and the interaction, if any, was dispatched).
    Delivered,
    /// Hooks and handlers ran, but interaction dispatch failed.
    DispatchFailed,
}

/// Decodes dispatch frames and fans them out.
pub struct EventRouter {
    session: Arc<Session>,
    client: Client,
    hooks: Arc<dyn EventHooks>,
    handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventRouter {
    /// Creates a router with no hooks and no handlers.
    pub fn new(session: Arc<Session>, client: Client) -> Self {
        Self {
            session,
            client,
            hooks: Arc::new(NoHooks),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the built-in hooks.
    pub fn with_hooks(self, hooks: impl EventHooks) -> Self {
        self.with_shared_hooks(Arc::new(hooks))
    }

    /// Replaces the built-in hooks with an already shared instance.
    pub fn with_shared_hooks(mut self, hooks: Arc<dyn EventHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Appends a handler for `kind`.
    pub fn register_event_handler<T>(&self, kind: EventKind, handler: impl IntoEventHandler<T>) {
        debug!(event = %kind, "Registering event handler");
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(handler.into_event_handler());
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Decodes and routes one dispatch frame, gated on the session's current
    /// readiness.
    pub async fn route(&self, event_type: &str, payload: Value) -> RouteOutcome {
        let ready = self.session.is_ready();
        self.route_received(event_type, payload, ready).await
    }

    /// Like [`route`](Self::route), with readiness captured by the caller
    /// when the frame was read.
    pub async fn route_received(
        &self,
        event_type: &str,
        payload: Value,
        ready: bool,
    ) -> RouteOutcome {
        let event = match decode(event_type, &payload) {
            Ok(Some(event)) => Arc::new(event),
            Ok(None) => return RouteOutcome::Unknown,
            Err(e) => {
                error!(event = %event_type, error = %e, "Failed to decode event payload");
                return RouteOutcome::Malformed;
            }
        };

        let gated = !matches!(event.kind, EventKind::Ready | EventKind::Resumed);
        if gated && !ready {
            warn!(event = %event.kind, "Dropping event received before READY");
            return RouteOutcome::NotReady;
        }

        let span = debug_span!("dispatch", event = %event.kind);
        self.deliver(event).instrument(span).await
    }

    async fn deliver(&self, event: Arc<GatewayEvent>) -> RouteOutcome {
        call_hook(self.hooks.as_ref(), &event, &self.client).await;
        self.hooks.on_any(&event, &self.client).await;

        let handlers = self
            .handlers
            .read()
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();
        for (index, handler) in handlers.iter().enumerate() {
            if handler.blocking {
                warn!(event = %event.kind, index, "Blocking event handler invoked; it stalls the routing task");
            }
            if let Err(e) = (handler.func)(Arc::clone(&event), self.client.clone()).await {
                error!(event = %event.kind, index, error = %e, "Event handler failed");
            }
        }

        let EventData::Interaction(interaction) = &event.data else {
            trace!(event = %event.kind, handlers = handlers.len(), "Event delivered");
            return RouteOutcome::Delivered;
        };

        let interaction = Arc::new(interaction.as_ref().clone());
        let result = self
            .client
            .dispatcher()
            .handle_interaction(interaction, event.raw.clone(), self.client.clone())
            .await;
        match result {
            Ok(()) => RouteOutcome::Delivered,
            Err(e) => {
                self.hooks.on_dispatch_error(&event, &e).await;
                RouteOutcome::DispatchFailed
            }
        }
    }
}
