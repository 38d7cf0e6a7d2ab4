//! Transaction router
//!
//! Maps each in-flight `trans_id` to the client connection that issued it.

use crate::connection::Connection;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::Envelope;
use tokio::time::Instant;

/// An in-flight transaction
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Connection awaiting the reply
    pub connection: Arc<Connection>,

    /// Routing header of the originating request
    pub request: Envelope,

    /// When the transaction was registered
    pub created_at: Instant,
}

impl Transaction {
    /// Check whether the transaction has been pending longer than `timeout`
    #[must_use]
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.created_at.elapsed() >= timeout
    }
}

/// Routes service replies back to the originating connection
pub struct TransactionRouter {
    transactions: DashMap<String, Transaction>,
}

impl TransactionRouter {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
        }
    }

    /// Create an empty router wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register `trans_id` for `connection`.
    ///
    /// The first registration wins: returns `false` and leaves the existing
    /// entry untouched when the id is already in flight.
    pub fn register(&self, trans_id: &str, request: &Envelope, connection: &Arc<Connection>) -> bool {
        match self.transactions.entry(trans_id.to_string()) {
            Entry::Occupied(existing) => {
                tracing::debug!(
                    trans_id = %trans_id,
                    connection_id = %connection.id(),
                    owner = %existing.get().connection.id(),
                    "Transaction already registered"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(Transaction {
                    connection: connection.clone(),
                    request: request.routing_header(),
                    created_at: Instant::now(),
                });
                true
            }
        }
    }

    /// Look up the connection awaiting `trans_id`
    pub fn resolve(&self, trans_id: &str) -> Option<Arc<Connection>> {
        self.transactions
            .get(trans_id)
            .map(|t| t.connection.clone())
    }

    /// Remove and return the transaction for `trans_id`
    pub fn complete(&self, trans_id: &str) -> Option<Transaction> {
        self.transactions.remove(trans_id).map(|(_, t)| t)
    }

    /// Remove `trans_id` only if `connection_id` owns it
    pub fn complete_owned(&self, trans_id: &str, connection_id: &str) -> Option<Transaction> {
        self.transactions
            .remove_if(trans_id, |_, t| t.connection.id() == connection_id)
            .map(|(_, t)| t)
    }

    /// Drop every transaction owned by a connection
    pub fn purge_connection(&self, connection_id: &str) -> usize {
        let before = self.transactions.len();
        self.transactions
            .retain(|_, t| t.connection.id() != connection_id);
        let count = before.saturating_sub(self.transactions.len());

        if count > 0 {
            tracing::debug!(
                connection_id = %connection_id,
                count = count,
                "Purged transactions of closed connection"
            );
        }

        count
    }

    /// Remove and return every transaction pending longer than `timeout`
    pub fn expire(&self, timeout: Duration) -> Vec<(String, Transaction)> {
        let stale: Vec<String> = self
            .transactions
            .iter()
            .filter(|t| t.is_expired(timeout))
            .map(|t| t.key().clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.transactions.remove_if(&id, |_, t| t.is_expired(timeout)))
            .collect()
    }

    /// Check whether `trans_id` is in flight
    pub fn contains(&self, trans_id: &str) -> bool {
        self.transactions.contains_key(trans_id)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl Default for TransactionRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransactionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRouter")
            .field("pending", &self.transactions.len())
            .finish()
    }
}
