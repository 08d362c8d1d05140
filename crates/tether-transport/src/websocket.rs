//! WebSocket gateway connector.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{Error, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use tether_core::{ConnectionHandle, GatewayConnector, Inbound, TransportError, TransportResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Opens gateway connections over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    channel_capacity: usize,
}

impl WsConnector {
    /// Creates a connector with the default channel capacity.
    pub fn new() -> Self {
        Self {
            channel_capacity: 256,
        }
    }

    /// Sets the capacity of the inbound and outbound frame channels.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

/// State owned by the socket task of one connection.
struct SocketLoopState {
    conn_id: String,
    ws_tx: WsSink,
    ws_rx: WsSource,
    inbound_tx: mpsc::Sender<Inbound>,
}

impl SocketLoopState {
    /// Forwards a received frame. Returns false once the reader has gone away.
    async fn forward(&self, text: String) -> bool {
        trace!(conn_id = %self.conn_id, len = text.len(), "Received");
        self.inbound_tx.send(Inbound::Text(text)).await.is_ok()
    }

    async fn finish(&self, code: Option<u16>, reason: String) {
        let _ = self.inbound_tx.send(Inbound::Closed { code, reason }).await;
    }

    /// Handles one item from the socket stream.
    /// Returns true if the loop should continue.
    async fn handle_message(&mut self, msg: Option<Result<Message, Error>>) -> bool {
        match msg {
            Some(Ok(Message::Text(text))) => self.forward(text.as_str().to_owned()).await,
            Some(Ok(Message::Binary(data))) => {
                self.forward(String::from_utf8_lossy(&data).into_owned())
                    .await
            }
            Some(Ok(Message::Ping(data))) => {
                trace!(conn_id = %self.conn_id, "Received ping, sending pong");
                let _ = self.ws_tx.send(Message::Pong(data)).await;
                true
            }
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => true,
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = match frame {
                    Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_owned()),
                    None => (None, "closed without frame".to_string()),
                };
                info!(conn_id = %self.conn_id, code = ?code, reason = %reason, "Server closed connection");
                self.finish(code, reason).await;
                false
            }
            Some(Err(e)) => {
                warn!(conn_id = %self.conn_id, error = %e, "WebSocket error");
                self.finish(None, e.to_string()).await;
                false
            }
            None => {
                info!(conn_id = %self.conn_id, "WebSocket stream ended");
                self.finish(None, "stream ended".to_string()).await;
                false
            }
        }
    }
}

#[async_trait]
impl GatewayConnector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> TransportResult<(ConnectionHandle, mpsc::Receiver<Inbound>)> {
        let (message_tx, mut message_rx) = mpsc::channel::<String>(self.channel_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>(self.channel_capacity);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        info!(url = %url, "Connecting to gateway");

        let (ws_stream, _response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    url: url.to_string(),
                    reason: format!("WebSocket connection failed: {e}"),
                })?;

        let conn_id = format!("gateway-{}", ws_conn_suffix());
        info!(conn_id = %conn_id, "Gateway socket connected");

        let handle = ConnectionHandle::new(conn_id.clone(), message_tx, shutdown_tx);
        let (ws_tx, ws_rx) = ws_stream.split();
        let mut state = SocketLoopState {
            conn_id,
            ws_tx,
            ws_rx,
            inbound_tx,
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!(conn_id = %state.conn_id, "Closing gateway socket");
                            let _ = state.ws_tx.close().await;
                            state.finish(None, "closed by client".to_string()).await;
                            break;
                        }
                    }

                    Some(text) = message_rx.recv() => {
                        trace!(conn_id = %state.conn_id, len = text.len(), "Sending");
                        if let Err(e) = state.ws_tx.send(Message::Text(text.into())).await {
                            warn!(conn_id = %state.conn_id, error = %e, "Failed to send frame");
                            state.finish(None, e.to_string()).await;
                            break;
                        }
                    }

                    msg = state.ws_rx.next() => {
                        if !state.handle_message(msg).await {
                            break;
                        }
                    }
                }
            }
        });

        Ok((handle, inbound_rx))
    }
}

/// Short process-unique suffix for connection ids in logs.
fn ws_conn_suffix() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn test_round_trip_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"op":10,"d":{"heartbeat_interval":1000}}"#.into()))
                .await
                .unwrap();
            let echoed = ws.next().await.unwrap().unwrap();
            ws.close(None).await.unwrap();
            echoed.into_text().unwrap().as_str().to_owned()
        });

        let connector = WsConnector::new();
        let (handle, mut inbound) = connector.connect(&format!("ws://{addr}")).await.unwrap();

        let hello = inbound.recv().await.unwrap();
        assert!(matches!(hello, Inbound::Text(ref t) if t.contains("heartbeat_interval")));

        handle.send(r#"{"op":1,"d":null}"#.to_string()).await.unwrap();
        assert_eq!(server.await.unwrap(), r#"{"op":1,"d":null}"#);

        loop {
            match inbound.recv().await {
                Some(Inbound::Closed { .. }) | None => break,
                Some(Inbound::Text(_)) => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_connect_failure_reports_url() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("ws://{addr}");
        let err = WsConnector::new().connect(&url).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed { url: u, .. } if u == url));
    }
}
