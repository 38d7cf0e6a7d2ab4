//! Backend services
//!
//! Persistent WebSocket connections to the configured backends, their
//! reconnection policy and the reply path back to clients.

mod connection;
mod pool;
mod reconnect;
mod replies;

pub use connection::{ServiceConnection, ServiceState};
pub use pool::{PoolError, ServicePool};
pub use reconnect::ReconnectPolicy;
pub use replies::ReplyRouter;
