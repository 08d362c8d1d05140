//! # Tether Framework
//!
//! Everything that happens after a dispatch frame has been received.
//!
//! This layer provides:
//! - Event routing with per-kind hooks and registered handlers
//! - Application command resolution with a three-tier cache
//! - Component custom-id registration with expiry
//! - The one-response-then-followups interaction lifecycle
//!
//! The gateway session that feeds this layer lives in `tether-runtime`.

pub mod callback;
pub mod commands;
pub mod components;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod response;
pub mod router;
pub mod ttl;

#[cfg(test)]
pub(crate) mod testing;

pub use callback::{Callback, IntoBlockingCallback, IntoCallback, IntoCallbackResult};
pub use commands::{CommandRegistry, ResolvedCommand};
pub use components::{CustomIdEntry, CustomIdRegistry};
pub use context::Client;
pub use dispatcher::InteractionDispatcher;
pub use error::{DispatchError, DispatchResult, ResponseError, ResponseResult, StateError};
pub use response::{FollowupBuilder, InteractionContext, InteractionToken, ResponseBuilder};
pub use router::{
    EventHandler, EventHooks, EventRouter, IntoEventHandler, NoHooks, RouteOutcome,
};
pub use ttl::{DEFAULT_TTL, TtlCache};
