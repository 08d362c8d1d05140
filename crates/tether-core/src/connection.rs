//! Gateway connection handle and connector contract.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::error::{TransportError, TransportResult};
use crate::protocol::GatewayFrame;

// =============================================================================
// Inbound
// =============================================================================

/// Something read from the gateway socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Text(String),
    /// The socket closed or failed; nothing follows.
    Closed {
        /// Close code, if the server sent one.
        code: Option<u16>,
        /// Close reason or error message.
        reason: String,
    },
}

// =============================================================================
// Handle
// =============================================================================

/// Handle to an open gateway connection.
///
/// Cloning is cheap; every clone writes to the same socket.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Identifier used in logs.
    pub id: String,
    /// Sender for outgoing text frames.
    message_tx: mpsc::Sender<String>,
    /// Shutdown signal sender.
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    /// Creates a new connection handle.
    pub fn new(
        id: impl Into<String>,
        message_tx: mpsc::Sender<String>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            id: id.into(),
            message_tx,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Sends a raw text frame.
    pub async fn send(&self, text: String) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::SendFailed("connection closed".into()));
        }
        self.message_tx
            .send(text)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Sends a gateway frame.
    pub async fn send_frame(&self, frame: &GatewayFrame) -> TransportResult<()> {
        self.send(frame.to_text()).await
    }

    /// Closes this connection.
    pub fn close(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Subscribes to the shutdown signal.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

// =============================================================================
// Connector
// =============================================================================

/// Opens gateway connections.
///
/// The returned receiver yields every inbound frame in order and ends with a
/// single [`Inbound::Closed`]. Implementations must not reconnect on their
/// own; epochs are driven by the session manager.
#[async_trait]
pub trait GatewayConnector: Send + Sync {
    /// Connects to `url`.
    async fn connect(
        &self,
        url: &str,
    ) -> TransportResult<(ConnectionHandle, mpsc::Receiver<Inbound>)>;
}

/// Shared connector.
pub type BoxedConnector = Arc<dyn GatewayConnector>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_frame_and_close() {
        let (tx, mut rx) = mpsc::channel(4);
        let (shutdown_tx, _) = watch::channel(false);
        let handle = ConnectionHandle::new("test", tx, shutdown_tx);

        handle.send_frame(&GatewayFrame::heartbeat(None)).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some(r#"{"op":1,"d":null}"#));

        let mut shutdown = handle.subscribe_shutdown();
        handle.close();
        assert!(handle.is_closed());
        assert!(shutdown.has_changed().unwrap());
        assert!(handle.send("x".into()).await.is_err());
    }
}
