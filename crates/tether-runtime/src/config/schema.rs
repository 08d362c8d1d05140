//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_core::{Id, Intents};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TetherConfig {
    /// Gateway credentials and session behaviour.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Interaction dispatch settings.
    #[serde(default)]
    pub interactions: InteractionConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Gateway
// =============================================================================

/// Gateway credentials and session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bot token.
    #[serde(default)]
    pub token: String,

    /// Application id.
    #[serde(default)]
    pub application_id: u64,

    /// Gateway intents bitfield.
    #[serde(default = "default_intents")]
    pub intents: u64,

    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// REST request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attempts before a rate-limited REST call gives up.
    #[serde(default = "default_rate_limit_attempts")]
    pub max_rate_limit_attempts: u32,

    /// How often to check for the first heartbeat ACK, in milliseconds.
    #[serde(default = "default_ack_poll_interval_ms")]
    pub ack_poll_interval_ms: u64,

    /// How long one wait for the first heartbeat ACK lasts, in milliseconds.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Number of waits for the first ACK before giving up.
    #[serde(default = "default_ack_wait_attempts")]
    pub ack_wait_attempts: u32,

    /// Resume instead of re-identifying after a server-requested reconnect.
    #[serde(default)]
    pub resume_on_reconnect: bool,

    /// Reconnect after the connection drops instead of stopping.
    #[serde(default)]
    pub auto_reconnect: bool,

    /// Backoff for automatic reconnects.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            application_id: 0,
            intents: default_intents(),
            api_base: default_api_base(),
            request_timeout_ms: default_request_timeout_ms(),
            max_rate_limit_attempts: default_rate_limit_attempts(),
            ack_poll_interval_ms: default_ack_poll_interval_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            ack_wait_attempts: default_ack_wait_attempts(),
            resume_on_reconnect: false,
            auto_reconnect: false,
            retry: RetryConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn application_id(&self) -> Id {
        Id(self.application_id)
    }

    pub fn intents(&self) -> Intents {
        Intents(self.intents)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ack_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ack_poll_interval_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

fn default_intents() -> u64 {
    Intents::non_privileged().bits()
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_rate_limit_attempts() -> u32 {
    3
}

fn default_ack_poll_interval_ms() -> u64 {
    100
}

fn default_ack_timeout_ms() -> u64 {
    30000
}

fn default_ack_wait_attempts() -> u32 {
    3
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of reconnect attempts in a row.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay between attempts in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay between attempts in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// =============================================================================
// Interactions
// =============================================================================

/// Interaction dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionConfig {
    /// Lifetime of a registered custom id, in seconds from registration.
    #[serde(default = "default_custom_id_ttl_secs")]
    pub custom_id_ttl_secs: u64,

    /// How often expired custom ids are swept, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            custom_id_ttl_secs: default_custom_id_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl InteractionConfig {
    pub fn custom_id_ttl(&self) -> Duration {
        Duration::from_secs(self.custom_id_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_custom_id_ttl_secs() -> u64 {
    15 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `tether_runtime = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            filters: HashMap::new(),
        }
    }
}
