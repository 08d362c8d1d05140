//! Session state shared between the receive loop and the heartbeat task.
//!
//! The receive loop is the only writer of the sequence number and session id;
//! the heartbeat task and dispatch tasks only read them.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use crate::model::Id;
use crate::protocol::Intents;

/// A nullable sequence number readable without a lock.
#[derive(Debug)]
pub struct SequenceCell(AtomicI64);

impl SequenceCell {
    const NONE: i64 = -1;

    /// Creates an empty cell.
    pub fn new() -> Self {
        Self(AtomicI64::new(Self::NONE))
    }

    /// Returns the last stored sequence number.
    pub fn get(&self) -> Option<u64> {
        let value = self.0.load(Ordering::Acquire);
        u64::try_from(value).ok()
    }

    /// Stores a new sequence number.
    pub fn set(&self, seq: u64) {
        let value = i64::try_from(seq).unwrap_or(i64::MAX);
        self.0.store(value, Ordering::Release);
    }

    /// Clears the cell.
    pub fn clear(&self) {
        self.0.store(Self::NONE, Ordering::Release);
    }
}

impl Default for SequenceCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Gateway session state.
#[derive(Debug)]
pub struct Session {
    token: String,
    application_id: Id,
    intents: Intents,
    sequence: SequenceCell,
    session_id: RwLock<Option<String>>,
    ready: AtomicBool,
}

impl Session {
    /// Creates a session for the given credentials.
    pub fn new(token: impl Into<String>, application_id: Id, intents: Intents) -> Self {
        Self {
            token: token.into(),
            application_id,
            intents,
            sequence: SequenceCell::new(),
            session_id: RwLock::new(None),
            ready: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn application_id(&self) -> Id {
        self.application_id
    }

    pub fn intents(&self) -> Intents {
        self.intents
    }

    /// Returns the sequence number current at the time of the call.
    pub fn sequence(&self) -> Option<u64> {
        self.sequence.get()
    }

    /// Records the `s` field of an inbound frame.
    pub fn observe_sequence(&self, seq: u64) {
        self.sequence.set(seq);
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Returns true once READY (or RESUMED) has been seen in this epoch.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Applies the session-level side effects of a dispatch, before routing.
    ///
    /// READY stores the session id and marks the session ready; RESUMED only
    /// marks it ready.
    pub fn observe_dispatch(&self, event_type: &str, payload: &Value) {
        match event_type {
            "READY" => {
                let session_id = payload
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                info!(session_id = ?session_id, "Session ready");
                *self.session_id.write() = session_id;
                self.ready.store(true, Ordering::Release);
            }
            "RESUMED" => {
                info!("Session resumed");
                self.ready.store(true, Ordering::Release);
            }
            _ => {}
        }
    }

    /// Resets per-epoch state at the start of a new connection.
    ///
    /// The session id and sequence survive so a resume can use them.
    pub fn begin_epoch(&self) {
        debug!("Starting new connection epoch");
        self.ready.store(false, Ordering::Release);
    }

    /// Opens the READY gate for a resuming epoch.
    ///
    /// The server replays missed dispatches before RESUMED; they belong to
    /// the resumed session and are routed like any post-READY event.
    pub fn begin_resume(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Forgets the session after an Invalid Session, forcing a fresh identify.
    pub fn invalidate(&self) {
        *self.session_id.write() = None;
        self.sequence.clear();
        self.ready.store(false, Ordering::Release);
    }

    /// Returns `(session_id, seq)` if the session can be resumed.
    pub fn resume_point(&self) -> Option<(String, u64)> {
        let session_id = self.session_id()?;
        let seq = self.sequence()?;
        Some((session_id, seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> Session {
        Session::new("tok", Id(1), Intents::GUILDS)
    }

    #[test]
    fn test_sequence_cell() {
        let cell = SequenceCell::new();
        assert_eq!(cell.get(), None);
        cell.set(3);
        assert_eq!(cell.get(), Some(3));
        cell.clear();
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn test_ready_sets_session_id() {
        let session = session();
        assert!(!session.is_ready());
        session.observe_dispatch("TYPING_START", &json!({}));
        assert!(!session.is_ready());
        session.observe_dispatch("READY", &json!({"session_id": "abc"}));
        assert!(session.is_ready());
        assert_eq!(session.session_id().as_deref(), Some("abc"));
    }

    #[test]
    fn test_epoch_reset_keeps_resume_point() {
        let session = session();
        session.observe_sequence(7);
        session.observe_dispatch("READY", &json!({"session_id": "abc"}));
        session.begin_epoch();
        assert!(!session.is_ready());
        assert_eq!(session.resume_point(), Some(("abc".to_string(), 7)));

        session.invalidate();
        assert_eq!(session.resume_point(), None);
        assert_eq!(session.sequence(), None);
    }

    #[test]
    fn test_resume_opens_gate_before_resumed() {
        let session = session();
        session.begin_epoch();
        session.begin_resume();
        assert!(session.is_ready());

        session.invalidate();
        assert!(!session.is_ready());
    }
}
