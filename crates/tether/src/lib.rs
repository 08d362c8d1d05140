//! # Tether
//!
//! An asynchronous gateway client with interaction dispatch.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  frames  ┌──────────────┐  events  ┌────────┐  interactions  ┌────────────┐
//! │  Connector   │─────────▶│ Receive loop │─────────▶│ Router │───────────────▶│ Dispatcher │
//! └──────────────┘          └──────────────┘          └────────┘                └────────────┘
//!        ▲                        │                        │                          │
//!        │ heartbeat              ▼                        ▼                          ▼
//!  ┌───────────┐            ┌─────────┐              hooks + handlers         callbacks + REST
//!  │ Heartbeat │◀───seq─────│ Session │
//!  └───────────┘            └─────────┘
//! ```
//!
//! - **Core**: wire protocol, session state, REST and connector contracts
//! - **Transport**: the `reqwest` REST client and `tokio-tungstenite` connector
//! - **Framework**: event routing, command/custom-id dispatch, response lifecycle
//! - **Runtime**: the session manager, client facade, configuration and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tether::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     init_from_config(&config.logging);
//!
//!     let client = TetherClient::from_config(&config)?;
//!     client.register_global_command("ping", |ctx: InteractionContext| async move {
//!         ctx.respond(MessagePayload::text("pong")).await
//!     }, None);
//!
//!     client.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default), `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `ws-client`, `http-client` (default): WebSocket connector and REST client

pub use tether_core as core;
pub use tether_framework as framework;
pub use tether_runtime as runtime;
pub use tether_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tether::prelude::*;
/// ```
pub mod prelude {
    // Client - main entry point
    pub use tether_runtime::{TetherClient, TetherClientBuilder};

    // Configuration and logging
    pub use tether_runtime::config::{ConfigLoader, TetherConfig, load_config};
    pub use tether_runtime::logging::{LoggingBuilder, init_from_config};

    // Events - for handlers and hooks
    pub use tether_core::{EventKind, GatewayEvent, Id, Intents};
    pub use tether_framework::{Client, EventHooks};

    // Interactions - for command and component callbacks
    pub use tether_core::model::{Interaction, Message, MessagePayload};
    pub use tether_framework::{InteractionContext, ResponseError, ResponseResult};

    // Logging macros
    pub use tether_runtime::prelude::*;
}
