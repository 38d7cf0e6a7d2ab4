//! Connection management
//!
//! Tracks client WebSocket connections and their identity and liveness state.

mod connection;
mod manager;

pub use connection::{Connection, SendError};
pub use manager::ConnectionManager;
