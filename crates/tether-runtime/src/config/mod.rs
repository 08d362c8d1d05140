//! Configuration for the Tether client.
//!
//! Layered figment-based loading plus validation of gateway credentials,
//! interaction registry settings and logging.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    GatewayConfig, InteractionConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, RetryConfig,
    SpanEventConfig, TetherConfig,
};
pub use validation::validate_config;
