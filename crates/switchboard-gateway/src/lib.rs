//! # switchboard-gateway
//!
//! WebSocket gateway that correlates client transactions with backend services.
//!
//! Clients send envelopes tagged with a `trans_id`. The gateway forwards each one
//! to the named backend over a persistent socket, or runs an in-process handler
//! for the reserved `_server_` service, and routes the reply back to the client
//! that issued the transaction.

pub mod connection;
pub mod handlers;
pub mod heartbeat;
pub mod protocol;
pub mod server;
pub mod services;
pub mod transaction;

pub use connection::{Connection, ConnectionManager};
pub use handlers::{
    DispatchError, DispatchOutcome, HandlerContext, HandlerError, HandlerRegistry, HandlerResult,
    LocalHandler, MessageDispatcher, RoutingDescriptor,
};
pub use server::{create_app, create_gateway_state, run, run_with_handlers, GatewayState};
pub use services::{ReconnectPolicy, ServicePool, ServiceState};
pub use transaction::TransactionRouter;
