//! Individual client connection
//!
//! Represents a single client WebSocket and its identity and liveness state.

use crate::protocol::OutboundFrame;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use switchboard_core::{Role, UserContext};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Error returned when a frame cannot be queued for a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
    #[error("outbound buffer full")]
    Full,
}

impl From<mpsc::error::TrySendError<OutboundFrame>> for SendError {
    fn from(err: mpsc::error::TrySendError<OutboundFrame>) -> Self {
        match err {
            mpsc::error::TrySendError::Full(_) => Self::Full,
            mpsc::error::TrySendError::Closed(_) => Self::Closed,
        }
    }
}

/// Caller identity, replaced as a whole on authentication
#[derive(Debug, Clone, Default)]
struct Identity {
    role: Role,
    user_id: Option<String>,
}

/// A single client connection
pub struct Connection {
    /// Unique connection ID
    id: String,

    /// Role and user id (Anonymous until authenticated)
    identity: RwLock<Identity>,

    /// Cleared when a heartbeat ping goes out, set again by the pong
    alive: AtomicBool,

    /// When the last ping was sent
    last_ping: Mutex<Option<Instant>>,

    /// One-way latency estimate in milliseconds
    latency_ms: RwLock<Option<f64>>,

    /// Channel to the socket writer
    sender: mpsc::Sender<OutboundFrame>,
}

impl Connection {
    /// Create a new connection
    pub fn new(id: String, sender: mpsc::Sender<OutboundFrame>) -> Arc<Self> {
        Arc::new(Self {
            id,
            identity: RwLock::new(Identity::default()),
            alive: AtomicBool::new(true),
            last_ping: Mutex::new(None),
            latency_ms: RwLock::new(None),
            sender,
        })
    }

    /// Generate a new connection ID
    #[must_use]
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Get the connection ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the current role
    pub fn role(&self) -> Role {
        self.identity.read().role.clone()
    }

    /// Get the user ID (if authenticated)
    pub fn user_id(&self) -> Option<String> {
        self.identity.read().user_id.clone()
    }

    /// Snapshot of role and user id for a forwarded request
    pub fn user_context(&self) -> UserContext {
        let identity = self.identity.read();
        UserContext::new(identity.role.clone(), identity.user_id.clone())
    }

    /// Replace role and user id
    pub fn set_identity(&self, role: Role, user_id: Option<String>) {
        *self.identity.write() = Identity { role, user_id };
    }

    /// Check if the connection has authenticated
    pub fn is_authenticated(&self) -> bool {
        !self.identity.read().role.is_anonymous()
    }

    /// Whether the last heartbeat ping was answered
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Record that a ping was sent without waiting on its answer
    pub fn stamp_ping(&self) {
        *self.last_ping.lock() = Some(Instant::now());
    }

    /// Record that a heartbeat ping is going out and a pong is now expected.
    ///
    /// Returns the previous liveness for [`cancel_heartbeat`](Self::cancel_heartbeat).
    pub fn begin_heartbeat(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::SeqCst);
        self.stamp_ping();
        was_alive
    }

    /// Undo [`begin_heartbeat`](Self::begin_heartbeat) for a ping that was never queued
    pub fn cancel_heartbeat(&self, was_alive: bool) {
        if was_alive {
            self.alive.store(true, Ordering::SeqCst);
        }
    }

    /// Record a pong, returning the new latency estimate
    ///
    /// Latency is half the round trip since the last ping.
    pub fn record_pong(&self) -> Option<f64> {
        self.alive.store(true, Ordering::SeqCst);

        let sent = (*self.last_ping.lock())?;
        let latency = sent.elapsed().as_secs_f64() * 1000.0 / 2.0;
        *self.latency_ms.write() = Some(latency);
        Some(latency)
    }

    /// Last measured one-way latency in milliseconds
    pub fn latency_ms(&self) -> Option<f64> {
        *self.latency_ms.read()
    }

    /// Queue a frame for the socket writer (non-blocking)
    pub fn send(&self, frame: OutboundFrame) -> Result<(), SendError> {
        self.sender.try_send(frame).map_err(SendError::from)
    }

    /// Queue a text frame
    pub fn send_text(&self, text: String) -> Result<(), SendError> {
        self.send(OutboundFrame::Text(text))
    }

    /// Ask the socket writer to close the connection
    pub fn close(&self) {
        if let Err(e) = self.send(OutboundFrame::Close) {
            tracing::debug!(connection_id = %self.id, error = %e, "Close frame not queued");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role())
            .field("alive", &self.is_alive())
            .field("latency_ms", &self.latency_ms())
            .finish()
    }
}
