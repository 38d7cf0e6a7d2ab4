//! Client heartbeat
//!
//! Ping/pong liveness probing and latency estimation for client connections.

mod monitor;

pub use monitor::{HeartbeatExit, HeartbeatMonitor};
