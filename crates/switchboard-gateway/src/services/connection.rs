//! Persistent connection to one backend service
//!
//! Each configured service gets a supervisor task that keeps a WebSocket open,
//! forwards queued requests and routes replies back through [`ReplyRouter`].

use super::{PoolError, ReconnectPolicy, ReplyRouter};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type ServiceStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state of a backend service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Connecting,
    Open,
    Closed,
}

impl ServiceState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a session with the backend ended
enum SessionEnd {
    /// Backend closed or the socket failed
    Dropped,
    /// Gateway is shutting down
    Shutdown,
}

/// A named backend and its current socket
pub struct ServiceConnection {
    name: String,
    url: String,
    state: RwLock<ServiceState>,
    outbound: RwLock<Option<mpsc::UnboundedSender<String>>>,
    attempts: AtomicU32,
}

impl ServiceConnection {
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            url: url.into(),
            state: RwLock::new(ServiceState::Closed),
            outbound: RwLock::new(None),
            attempts: AtomicU32::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ServiceState::Open
    }

    /// Total connection attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Queue a frame for the backend; fails unless the socket is open
    pub fn send(&self, text: String) -> Result<(), PoolError> {
        let outbound = self.outbound.read();
        match outbound.as_ref() {
            Some(tx) if self.is_open() => tx
                .send(text)
                .map_err(|_| PoolError::NotConnected(self.name.clone())),
            _ => Err(PoolError::NotConnected(self.name.clone())),
        }
    }

    fn set_state(&self, state: ServiceState) {
        *self.state.write() = state;
    }

    fn end_session(&self) {
        *self.outbound.write() = None;
        self.set_state(ServiceState::Closed);
    }

    /// Keep the backend connected until shutdown or the retry cap is reached
    pub(crate) async fn supervise(
        self: Arc<Self>,
        policy: ReconnectPolicy,
        replies: ReplyRouter,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut failures: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(ServiceState::Connecting);
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(service = %self.name, url = %self.url, attempt = attempt, "Connecting to service");

            let connected = tokio::select! {
                result = connect_async(self.url.as_str()) => result,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok((stream, _)) => {
                    failures = 0;
                    let end = self.run_session(stream, &replies, &mut shutdown).await;
                    self.end_session();

                    if matches!(end, SessionEnd::Shutdown) {
                        break;
                    }
                    tracing::warn!(service = %self.name, "Service connection closed");
                }
                Err(e) => {
                    failures += 1;
                    self.set_state(ServiceState::Closed);
                    tracing::warn!(
                        service = %self.name,
                        url = %self.url,
                        failures = failures,
                        error = %e,
                        "Service connection failed"
                    );
                }
            }

            if !policy.should_retry(failures) {
                tracing::error!(
                    service = %self.name,
                    failures = failures,
                    "Giving up on service after repeated failures"
                );
                break;
            }

            tokio::select! {
                () = tokio::time::sleep(policy.delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.end_session();
        tracing::debug!(service = %self.name, "Service supervisor stopped");
    }

    async fn run_session(
        &self,
        stream: ServiceStream,
        replies: &ReplyRouter,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let (mut sink, mut source) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        *self.outbound.write() = Some(tx);
        self.set_state(ServiceState::Open);
        tracing::info!(service = %self.name, url = %self.url, "Service connection open");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        tracing::debug!(service = %self.name, error = %e, "Close frame not sent");
                    }
                    return SessionEnd::Shutdown;
                }

                Some(text) = rx.recv() => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        tracing::warn!(service = %self.name, error = %e, "Failed to forward request");
                    }
                }

                frame = source.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.handle_reply(replies, &text),
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => self.handle_reply(replies, &text),
                            Err(e) => {
                                tracing::warn!(service = %self.name, error = %e, "Non-UTF-8 binary frame dropped");
                            }
                        },
                        Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            // The stream ends on its own after an error
                            tracing::warn!(service = %self.name, error = %e, "Service connection error");
                        }
                    }
                }
            }
        }
    }

    fn handle_reply(&self, replies: &ReplyRouter, text: &str) {
        if let Err(e) = replies.route(&self.name, text) {
            tracing::warn!(service = %self.name, error = %e, "Service reply dropped");
        }
    }
}

impl std::fmt::Debug for ServiceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConnection")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish()
    }
}
