//! Fakes for driving the gateway without a network.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc, watch};

use tether_core::model::{ApplicationCommand, InteractionResponse, Message, MessagePayload};
use tether_core::{
    ApiError, ApiResult, ConnectionHandle, GatewayConnector, Id, Inbound, RestClient,
    TransportResult,
};

/// REST stub that only knows the gateway URL.
pub(crate) struct StubRest;

#[async_trait]
impl RestClient for StubRest {
    async fn get_gateway_url(&self) -> ApiResult<String> {
        Ok("wss://gateway.test".into())
    }
    async fn get_application_command(&self, _: Id) -> ApiResult<ApplicationCommand> {
        Err(not_found())
    }
    async fn get_guild_application_command(&self, _: Id, _: Id) -> ApiResult<ApplicationCommand> {
        Err(not_found())
    }
    async fn send_interaction_response(
        &self,
        _: Id,
        _: &str,
        _: &InteractionResponse,
    ) -> ApiResult<()> {
        Ok(())
    }
    async fn send_followup(&self, _: &str, _: &MessagePayload) -> ApiResult<Message> {
        Err(not_found())
    }
    async fn edit_followup(&self, _: &str, _: Id, _: &MessagePayload) -> ApiResult<Message> {
        Err(not_found())
    }
    async fn delete_followup(&self, _: &str, _: Id) -> ApiResult<()> {
        Ok(())
    }
    async fn edit_original(&self, _: &str, _: &MessagePayload) -> ApiResult<Message> {
        Err(not_found())
    }
    async fn delete_original(&self, _: &str) -> ApiResult<()> {
        Ok(())
    }
}

pub(crate) fn not_found() -> ApiError {
    ApiError::Http {
        status: 404,
        message: "not found".into(),
    }
}

/// The server side of one fake connection.
pub(crate) struct ServerEnd {
    pub(crate) to_client: mpsc::Sender<Inbound>,
    pub(crate) from_client: mpsc::Receiver<String>,
}

impl ServerEnd {
    pub(crate) async fn send(&self, frame: Value) {
        self.to_client
            .send(Inbound::Text(frame.to_string()))
            .await
            .unwrap();
    }

    pub(crate) async fn recv(&mut self) -> Value {
        let text = self.from_client.recv().await.expect("client hung up");
        serde_json::from_str(&text).unwrap()
    }

    /// Receives frames until one with `op` arrives.
    pub(crate) async fn recv_op(&mut self, op: u64) -> Value {
        loop {
            let frame = self.recv().await;
            if frame["op"] == op {
                return frame;
            }
        }
    }
}

/// Connector whose connections are driven by the test through [`ServerEnd`].
#[derive(Default)]
pub(crate) struct FakeConnector {
    servers: Mutex<Vec<ServerEnd>>,
    pub(crate) urls: Mutex<Vec<String>>,
    pub(crate) connects: AtomicUsize,
    notify: Notify,
}

impl FakeConnector {
    /// Waits for the next connection.
    pub(crate) async fn accept(&self) -> ServerEnd {
        loop {
            if let Some(server) = self.servers.lock().pop() {
                return server;
            }
            self.notify.notified().await;
        }
    }
}

#[async_trait]
impl GatewayConnector for FakeConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> TransportResult<(ConnectionHandle, mpsc::Receiver<Inbound>)> {
        let n = self.connects.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());
        let (out_tx, out_rx) = mpsc::channel(64);
        let (in_tx, in_rx) = mpsc::channel(64);
        let (shutdown_tx, _) = watch::channel(false);
        self.servers.lock().push(ServerEnd {
            to_client: in_tx,
            from_client: out_rx,
        });
        self.notify.notify_one();
        Ok((ConnectionHandle::new(format!("fake-{n}"), out_tx, shutdown_tx), in_rx))
    }
}

pub(crate) fn ready(session_id: &str, seq: u64) -> Value {
    json!({
        "op": 0, "s": seq, "t": "READY",
        "d": {"v": 10, "user": {"id": "1", "username": "bot"}, "session_id": session_id}
    })
}

pub(crate) fn typing(seq: u64) -> Value {
    json!({
        "op": 0, "s": seq, "t": "TYPING_START",
        "d": {"channel_id": "5", "user_id": "6", "timestamp": seq}
    })
}

/// Hello, immediate heartbeat, ACK, identify, READY.
pub(crate) async fn handshake(server: &mut ServerEnd, interval: u64) -> Value {
    server.send(json!({"op": 10, "d": {"heartbeat_interval": interval}})).await;
    let beat = server.recv_op(1).await;
    server.send(json!({"op": 11})).await;
    let identify = server.recv_op(2).await;
    server.send(ready("sess-1", 1)).await;
    assert!(beat["d"].is_null());
    identify
}

