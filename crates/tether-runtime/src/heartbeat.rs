//! Heartbeat task and ACK tracking.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, trace, trace_span, warn};

use tether_core::{ConnectionHandle, GatewayFrame, Session};

/// When the last heartbeat ACK arrived.
#[derive(Debug, Default)]
pub struct AckState {
    last_ack_at: Mutex<Option<Instant>>,
}

impl AckState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an ACK received now.
    pub fn record(&self) {
        *self.last_ack_at.lock() = Some(Instant::now());
    }

    pub fn last_ack_at(&self) -> Option<Instant> {
        *self.last_ack_at.lock()
    }

    pub fn has_acked(&self) -> bool {
        self.last_ack_at.lock().is_some()
    }
}

/// A running heartbeat task.
///
/// Dropping or [stopping](Self::stop) it cancels the task, so replacing the
/// value held by the receive loop never leaves two heartbeats running.
#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Starts beating on `connection`: once right away, then every `interval`.
    ///
    /// Each beat carries the sequence number current at send time. A failed
    /// send closes the connection so the receive loop sees the failure.
    pub fn start(
        interval: Duration,
        connection: ConnectionHandle,
        session: Arc<Session>,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let token = cancel.clone();
        let span = trace_span!("heartbeat", connection = %connection.id);

        let handle = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            let seq = session.sequence();
                            if let Err(e) = connection.send_frame(&GatewayFrame::heartbeat(seq)).await {
                                warn!(error = %e, "Heartbeat send failed, closing connection");
                                connection.close();
                                break;
                            }
                            trace!(seq = ?seq, "Heartbeat sent");
                        }
                    }
                }
            }
            .instrument(span),
        );

        debug!(interval_ms = interval.as_millis() as u64, "Heartbeat started");
        Self {
            interval,
            cancel,
            handle,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the task.
    pub fn stop(self) {
        self.cancel.cancel();
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
