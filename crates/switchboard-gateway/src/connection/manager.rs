//! Connection manager
//!
//! Manages all active client connections using DashMap for thread-safe access.

use super::Connection;
use crate::protocol::OutboundFrame;
use dashmap::DashMap;
use std::sync::Arc;
use switchboard_core::Role;
use tokio::sync::mpsc;

/// Manages all active client connections
pub struct ConnectionManager {
    /// Active connections by connection ID
    connections: DashMap<String, Arc<Connection>>,
}

impl ConnectionManager {
    /// Create a new connection manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Create a new connection manager wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection under a fresh ID
    pub fn add_connection(&self, sender: mpsc::Sender<OutboundFrame>) -> Arc<Connection> {
        let connection = Connection::new(Connection::generate_id(), sender);
        self.connections
            .insert(connection.id().to_string(), connection.clone());

        tracing::debug!(connection_id = %connection.id(), "Connection added");

        connection
    }

    /// Remove a connection
    pub fn remove_connection(&self, connection_id: &str) -> Option<Arc<Connection>> {
        let removed = self.connections.remove(connection_id).map(|(_, c)| c);
        if removed.is_some() {
            tracing::debug!(connection_id = %connection_id, "Connection removed");
        }
        removed
    }

    /// Set the role and user id of a connection
    pub fn authenticate_connection(
        &self,
        connection_id: &str,
        role: Role,
        user_id: Option<String>,
    ) -> bool {
        if let Some(connection) = self.connections.get(connection_id) {
            tracing::debug!(
                connection_id = %connection_id,
                role = %role,
                user_id = ?user_id,
                "Connection authenticated"
            );
            connection.set_identity(role, user_id);
            true
        } else {
            false
        }
    }

    /// Snapshot of all connections
    pub fn all_connections(&self) -> Vec<Arc<Connection>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    /// Get the total number of active connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of authenticated connections
    pub fn authenticated_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|r| r.is_authenticated())
            .count()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections.len())
            .finish()
    }
}
