//! # Tether Runtime
//!
//! Orchestration layer for the Tether gateway client.
//!
//! This crate provides:
//! - The gateway session manager ([`GatewaySession`]): connect, heartbeat,
//!   identify or resume, and the single receive loop
//! - The client facade ([`TetherClient`]) with signal-driven shutdown
//! - Layered configuration ([`ConfigLoader`]) and logging ([`LoggingBuilder`])
//!
//! ```rust,ignore
//! use tether_runtime::prelude::*;
//! use tether_runtime::{TetherClient, config::load_config, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let client = TetherClient::from_config(&config)?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `toml-config` (default), `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `ws-client`, `http-client` (default): the concrete collaborators used by
//!   [`TetherClient::from_config`]

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod heartbeat;
pub mod logging;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{TetherClient, TetherClientBuilder};
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, GatewayConfig, InteractionConfig, LoggingConfig,
    TetherConfig,
};
pub use error::{GatewayError, GatewayResult, RuntimeError, RuntimeResult};
pub use gateway::{EpochEnd, GatewayOptions, GatewaySession, RetryPolicy};
pub use heartbeat::{AckState, Heartbeat};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// Provides the logging macros and `Level`.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
