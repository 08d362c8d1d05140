//! # Tether Core
//!
//! Wire protocol, session state and collaborator contracts for the Tether
//! gateway client.
//!
//! - **Protocol**: gateway frames, opcodes, identify/resume/heartbeat
//!   payloads and intents ([`GatewayFrame`], [`OpCode`], [`Intents`])
//! - **Events**: dispatch event kinds and the decoder ([`EventKind`],
//!   [`decode`])
//! - **Session**: sequence number, session id and ready flag shared between
//!   the receive loop and the heartbeat ([`Session`])
//! - **Collaborators**: the REST surface ([`RestClient`]) and the socket
//!   connector ([`GatewayConnector`])
//! - **Model**: thin entities that parse from and serialize to raw JSON
//!
//! ```text
//! ┌───────────┐   frames   ┌──────────────┐  decode  ┌────────┐
//! │ Connector │───────────▶│ Receive loop │─────────▶│ Router │
//! └───────────┘            └──────────────┘          └────────┘
//!                                 │ seq                   │
//!                                 ▼                       ▼
//!                            ┌─────────┐          ┌────────────┐
//!                            │ Session │          │ RestClient │
//!                            └─────────┘          └────────────┘
//! ```

pub mod connection;
pub mod error;
pub mod event;
pub mod model;
pub mod protocol;
pub mod rest;
pub mod session;

pub use connection::{BoxedConnector, ConnectionHandle, GatewayConnector, Inbound};
pub use error::{
    ApiError, ApiResult, DecodeError, DecodeResult, TransportError, TransportResult,
};
pub use event::{EventData, EventKind, GatewayEvent, UnknownEventKind, decode};
pub use model::{Entity, Id, Sendable};
pub use protocol::{
    ConnectionProperties, GATEWAY_VERSION, GatewayFrame, IdentifyPayload, Intents, OpCode,
    gateway_url,
};
pub use rest::{BoxedRestClient, RestClient};
pub use session::{SequenceCell, Session};
