//! Gateway session manager.
//!
//! One [`GatewaySession`] drives a sequence of connection epochs. Each epoch:
//!
//! ```text
//! fetch URL → connect → spawn receive loop → wait for first ACK → identify/resume
//!                              │
//!                              ├─ op 10 Hello       → (re)start heartbeat
//!                              ├─ op 11 ACK         → last_ack_at = now
//!                              ├─ op 1  Heartbeat   → beat immediately
//!                              ├─ op 0  Dispatch    → observe READY, spawn routing task
//!                              ├─ op 7  Reconnect   → end epoch
//!                              └─ op 9  Invalid     → forget session, end epoch
//! ```
//!
//! Routing tasks are spawned on a [`TaskTracker`] and outlive the epoch that
//! received them. The heartbeat is cancelled when its epoch ends.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use tether_core::{
    BoxedConnector, BoxedRestClient, ConnectionHandle, GatewayFrame, IdentifyPayload, Inbound,
    OpCode, Session, gateway_url,
};
use tether_framework::EventRouter;

use crate::config::{GatewayConfig, RetryConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::heartbeat::{AckState, Heartbeat};

// =============================================================================
// Options
// =============================================================================

/// Reconnect backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Delay before reconnect attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

/// Session manager behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOptions {
    /// How often to check for the first heartbeat ACK.
    pub ack_poll_interval: Duration,
    /// Length of one wait for the first ACK.
    pub ack_timeout: Duration,
    /// Waits before [`GatewayError::HeartbeatTimeout`].
    pub ack_wait_attempts: u32,
    /// Send Resume instead of Identify after a server-requested reconnect.
    pub resume_on_reconnect: bool,
    /// Reconnect with backoff after a recoverable failure.
    pub auto_reconnect: bool,
    pub retry: RetryPolicy,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for GatewayOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            ack_poll_interval: config.ack_poll_interval(),
            ack_timeout: config.ack_timeout(),
            ack_wait_attempts: config.ack_wait_attempts,
            resume_on_reconnect: config.resume_on_reconnect,
            auto_reconnect: config.auto_reconnect,
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

// =============================================================================
// Session manager
// =============================================================================

/// How an epoch ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochEnd {
    /// The server asked for a new connection.
    Reconnect {
        /// The session may be resumed.
        resumable: bool,
    },
    /// Shutdown was requested.
    Shutdown,
}

/// Drives gateway connection epochs until shutdown or a fatal error.
pub struct GatewaySession {
    session: Arc<Session>,
    rest: BoxedRestClient,
    connector: BoxedConnector,
    router: Arc<EventRouter>,
    options: GatewayOptions,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl GatewaySession {
    pub fn new(
        session: Arc<Session>,
        rest: BoxedRestClient,
        connector: BoxedConnector,
        router: Arc<EventRouter>,
        options: GatewayOptions,
    ) -> Self {
        Self {
            session,
            rest,
            connector,
            router,
            options,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses `tracker` for routing tasks.
    pub fn with_tracker(mut self, tracker: TaskTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Stops when `shutdown` is cancelled.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Runs epochs until shutdown.
    ///
    /// Returns the first error that is fatal or, with `auto_reconnect`, the
    /// error that exhausted the retry budget.
    pub async fn run(&self) -> GatewayResult<()> {
        let mut resume = false;
        let mut failures = 0u32;

        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            match self.run_epoch(resume).await {
                Ok(EpochEnd::Shutdown) => {
                    info!("Gateway session stopped");
                    return Ok(());
                }
                Ok(EpochEnd::Reconnect { resumable }) => {
                    resume = resumable && self.options.resume_on_reconnect;
                    failures = 0;
                    info!(resume, "Reconnecting to gateway");
                }
                Err(e) if self.shutdown.is_cancelled() => {
                    debug!(error = %e, "Connection ended during shutdown");
                    return Ok(());
                }
                Err(e) if self.should_retry(&e, failures) => {
                    let delay = self.options.retry.delay_for(failures);
                    failures += 1;
                    warn!(
                        error = %e,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "Gateway connection lost, reconnecting"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    resume = self.options.resume_on_reconnect;
                }
                Err(e) => {
                    error!(error = %e, "Gateway session failed");
                    return Err(e);
                }
            }
        }
    }

    fn should_retry(&self, error: &GatewayError, failures: u32) -> bool {
        self.options.auto_reconnect
            && error.is_recoverable()
            && failures < self.options.retry.max_retries
    }

    /// Runs one connection epoch.
    pub async fn run_epoch(&self, resume: bool) -> GatewayResult<EpochEnd> {
        self.session.begin_epoch();
        let resume_point = if resume {
            self.session.resume_point()
        } else {
            None
        };
        if resume_point.is_none() {
            self.session.invalidate();
        }

        let opened = tokio::select! {
            _ = self.shutdown.cancelled() => return Ok(EpochEnd::Shutdown),
            opened = self.open() => opened?,
        };
        let (connection, inbound) = opened;

        let epoch = self.shutdown.child_token();
        let ack = Arc::new(AckState::new());
        let receive_loop = ReceiveLoop {
            connection: connection.clone(),
            session: Arc::clone(&self.session),
            router: Arc::clone(&self.router),
            tracker: self.tracker.clone(),
            ack: Arc::clone(&ack),
            heartbeat: None,
            epoch: epoch.clone(),
        };
        let span = info_span!("receive_loop", connection = %connection.id);
        let receiver = tokio::spawn(receive_loop.run(inbound).instrument(span));

        let result = self
            .identify_and_wait(&connection, &ack, resume_point, receiver)
            .await;

        epoch.cancel();
        connection.close();
        result
    }

    /// Waits for the first ACK, identifies or resumes, then waits for the
    /// receive loop to end.
    async fn identify_and_wait(
        &self,
        connection: &ConnectionHandle,
        ack: &AckState,
        resume_point: Option<(String, u64)>,
        mut receiver: JoinHandle<GatewayResult<EpochEnd>>,
    ) -> GatewayResult<EpochEnd> {
        if let Some(end) = self.await_first_ack(ack, &mut receiver).await? {
            return Ok(end);
        }

        let frame = match resume_point {
            Some((session_id, seq)) => {
                info!(session_id = %session_id, seq, "Resuming session");
                self.session.begin_resume();
                GatewayFrame::resume(self.session.token(), &session_id, seq)
            }
            None => {
                info!(intents = self.session.intents().bits(), "Identifying");
                let payload = IdentifyPayload::new(self.session.token(), self.session.intents());
                GatewayFrame::identify(&payload)
            }
        };
        connection.send_frame(&frame).await?;

        joined(receiver.await)
    }

    async fn open(&self) -> GatewayResult<(ConnectionHandle, mpsc::Receiver<Inbound>)> {
        let base = self.rest.get_gateway_url().await?;
        let url = gateway_url(&base);
        info!(url = %url, "Connecting to gateway");
        Ok(self.connector.connect(&url).await?)
    }

    /// Polls for the first heartbeat ACK.
    ///
    /// Returns `Some` if the receive loop ended first.
    async fn await_first_ack(
        &self,
        ack: &AckState,
        receiver: &mut JoinHandle<GatewayResult<EpochEnd>>,
    ) -> GatewayResult<Option<EpochEnd>> {
        let attempts = self.options.ack_wait_attempts.max(1);
        for attempt in 1..=attempts {
            let deadline = Instant::now() + self.options.ack_timeout;
            loop {
                if ack.has_acked() {
                    debug!("First heartbeat ACK received");
                    return Ok(None);
                }
                if Instant::now() >= deadline {
                    break;
                }
                tokio::select! {
                    result = &mut *receiver => return joined(result).map(Some),
                    _ = tokio::time::sleep(self.options.ack_poll_interval) => {}
                }
            }
            warn!(
                attempt,
                attempts,
                waited_ms = self.options.ack_timeout.as_millis() as u64,
                "No heartbeat ACK yet, still waiting"
            );
        }
        Err(GatewayError::HeartbeatTimeout {
            waited: self.options.ack_timeout * attempts,
        })
    }
}

fn joined(result: Result<GatewayResult<EpochEnd>, JoinError>) -> GatewayResult<EpochEnd> {
    result.map_err(|e| GatewayError::Task(e.to_string()))?
}

// =============================================================================
// Receive loop
// =============================================================================

/// The single reader of one connection.
struct ReceiveLoop {
    connection: ConnectionHandle,
    session: Arc<Session>,
    router: Arc<EventRouter>,
    tracker: TaskTracker,
    ack: Arc<AckState>,
    heartbeat: Option<Heartbeat>,
    epoch: CancellationToken,
}

impl ReceiveLoop {
    async fn run(mut self, mut inbound: mpsc::Receiver<Inbound>) -> GatewayResult<EpochEnd> {
        loop {
            let message = tokio::select! {
                _ = self.epoch.cancelled() => return Ok(EpochEnd::Shutdown),
                message = inbound.recv() => message,
            };

            match message {
                Some(Inbound::Text(text)) => {
                    if let Some(end) = self.handle_text(&text).await? {
                        return Ok(end);
                    }
                }
                Some(Inbound::Closed { code, reason }) => {
                    return Err(GatewayError::ConnectionClosed { code, reason });
                }
                None => {
                    return Err(GatewayError::ConnectionClosed {
                        code: None,
                        reason: "inbound stream ended".into(),
                    });
                }
            }
        }
    }

    async fn handle_text(&mut self, text: &str) -> GatewayResult<Option<EpochEnd>> {
        let frame = match GatewayFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed gateway frame");
                return Ok(None);
            }
        };

        if let Some(seq) = frame.s {
            self.session.observe_sequence(seq);
        }

        match frame.opcode() {
            Ok(OpCode::Dispatch) => self.dispatch(frame),
            Ok(OpCode::Heartbeat) => {
                debug!("Server requested a heartbeat");
                let beat = GatewayFrame::heartbeat(self.session.sequence());
                self.connection.send_frame(&beat).await?;
            }
            Ok(OpCode::Reconnect) => {
                info!("Server requested reconnect");
                return Ok(Some(EpochEnd::Reconnect { resumable: true }));
            }
            Ok(OpCode::InvalidSession) => {
                warn!(resumable = ?frame.d.as_bool(), "Session invalidated by server");
                self.session.invalidate();
                return Ok(Some(EpochEnd::Reconnect { resumable: false }));
            }
            Ok(OpCode::Hello) => self.hello(&frame.d)?,
            Ok(OpCode::HeartbeatAck) => {
                trace!("Heartbeat ACK");
                self.ack.record();
            }
            Ok(op) => warn!(op = %op, "Unexpected opcode from server"),
            Err(op) => warn!(op, "Unknown opcode"),
        }
        Ok(None)
    }

    fn hello(&mut self, payload: &Value) -> GatewayResult<()> {
        let interval = payload
            .get("heartbeat_interval")
            .and_then(Value::as_u64)
            .filter(|ms| *ms > 0)
            .ok_or_else(|| GatewayError::Protocol("HELLO without heartbeat_interval".into()))?;

        info!(heartbeat_interval = interval, "Received HELLO");
        // Replacing the old value cancels its task.
        self.heartbeat = Some(Heartbeat::start(
            Duration::from_millis(interval),
            self.connection.clone(),
            Arc::clone(&self.session),
            &self.epoch,
        ));
        Ok(())
    }

    fn dispatch(&self, frame: GatewayFrame) {
        let Some(event_type) = frame.t else {
            warn!(seq = ?frame.s, "Dispatch frame without event type");
            return;
        };

        // READY must be visible before the next frame is read, and the gate
        // applies to the order frames arrived in.
        self.session.observe_dispatch(&event_type, &frame.d);
        let ready = self.session.is_ready();

        let router = Arc::clone(&self.router);
        let payload = frame.d;
        self.tracker.spawn(async move {
            let outcome = router.route_received(&event_type, payload, ready).await;
            trace!(event = %event_type, outcome = ?outcome, "Routing finished");
        });
    }
}
