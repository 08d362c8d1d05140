//! # Tether Transport
//!
//! Concrete collaborators for the contracts defined in `tether-core`.
//!
//! ## Features
//!
//! - `ws-client`: [`WsConnector`], the gateway socket over `tokio-tungstenite`
//! - `http-client`: [`HttpRestClient`], the REST surface over `reqwest`
//! - `full`: both
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  tether-runtime     │  (session manager, supervisor)
//! ├─────────────────────┤
//! │  tether-core        │  (GatewayConnector, RestClient)
//! ├─────────────────────┤
//! │  tether-transport   │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (TLS/WS)   │
//! └─────────────────────┘
//! ```
//!
//! Every REST call goes through a [`CallGate`], which serializes requests per
//! route and waits out rate limits before the request leaves the process.

pub mod gate;

#[cfg(feature = "http-client")]
pub mod http;

#[cfg(feature = "ws-client")]
pub mod websocket;

pub use gate::{Attempt, CallGate, RateLimitInfo};

#[cfg(feature = "http-client")]
pub use http::{DEFAULT_API_BASE, HttpClientConfig, HttpRestClient};

#[cfg(feature = "ws-client")]
pub use websocket::WsConnector;
