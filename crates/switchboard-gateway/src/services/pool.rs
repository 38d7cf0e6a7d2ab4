//! Service connection pool
//!
//! One [`ServiceConnection`] per configured backend, keyed by service name.

use super::{ReconnectPolicy, ReplyRouter, ServiceConnection, ServiceState};
use crate::transaction::TransactionRouter;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use switchboard_common::ServiceEndpoint;
use switchboard_core::Envelope;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Errors forwarding a request to a backend
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Unknown service {0}")]
    UnknownService(String),

    #[error("Service {0} is not connected")]
    NotConnected(String),

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// All backend service connections
pub struct ServicePool {
    services: DashMap<String, Arc<ServiceConnection>>,
    policy: ReconnectPolicy,
    replies: ReplyRouter,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ServicePool {
    /// Create a pool for the configured backends; nothing connects until [`start`](Self::start)
    #[must_use]
    pub fn new(
        endpoints: &[ServiceEndpoint],
        policy: ReconnectPolicy,
        transactions: Arc<TransactionRouter>,
    ) -> Self {
        let services = DashMap::new();
        for endpoint in endpoints {
            services.insert(
                endpoint.name.clone(),
                ServiceConnection::new(&endpoint.name, &endpoint.url),
            );
        }

        Self {
            services,
            policy,
            replies: ReplyRouter::new(transactions),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn a supervisor per service
    pub fn start(&self, shutdown: &watch::Receiver<bool>) {
        let mut tasks = self.tasks.lock();

        for entry in self.services.iter() {
            let service = entry.value().clone();
            tracing::info!(service = %service.name(), url = %service.url(), "Starting service connection");
            tasks.push(tokio::spawn(service.supervise(
                self.policy,
                self.replies.clone(),
                shutdown.clone(),
            )));
        }
    }

    /// Forward `envelope` to `service`.
    ///
    /// Does not wait for the reply; it comes back through the transaction router.
    pub fn send(&self, service: &str, envelope: &Envelope) -> Result<(), PoolError> {
        let connection = self
            .get(service)
            .ok_or_else(|| PoolError::UnknownService(service.to_string()))?;

        if !connection.is_open() {
            return Err(PoolError::NotConnected(service.to_string()));
        }

        connection.send(envelope.to_json()?)
    }

    pub fn get(&self, service: &str) -> Option<Arc<ServiceConnection>> {
        self.services.get(service).map(|r| r.value().clone())
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn state(&self, service: &str) -> Option<ServiceState> {
        self.services.get(service).map(|r| r.state())
    }

    pub fn is_open(&self, service: &str) -> bool {
        self.state(service) == Some(ServiceState::Open)
    }

    /// Total connection attempts made for `service`
    pub fn attempts(&self, service: &str) -> Option<u32> {
        self.services.get(service).map(|r| r.attempts())
    }

    /// Name and state of every service, sorted by name
    pub fn states(&self) -> Vec<(String, ServiceState)> {
        let mut states: Vec<_> = self
            .services
            .iter()
            .map(|r| (r.key().clone(), r.state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Wait for every supervisor to stop
    pub async fn join(&self) {
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Service supervisor task failed");
            }
        }
    }
}

impl std::fmt::Debug for ServicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePool")
            .field("services", &self.states())
            .field("policy", &self.policy)
            .finish()
    }
}
