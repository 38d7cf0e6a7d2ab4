//! Per-connection heartbeat
//!
//! Sends a ping on accept and then every heartbeat interval, and periodically
//! logs the connection's latency estimate. Pongs are recorded by the socket
//! reader through [`Connection::record_pong`].

use crate::connection::{Connection, SendError};
use crate::protocol::OutboundFrame;
use std::sync::Arc;
use std::time::Duration;
use switchboard_common::HeartbeatConfig;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Shortest accepted timer period
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Why a heartbeat monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// Socket writer went away
    Closed,
    /// Previous ping was never answered
    Unresponsive,
}

/// Heartbeat loop for one client connection
pub struct HeartbeatMonitor {
    connection: Arc<Connection>,
    interval: Duration,
    latency_log_interval: Duration,
    terminate_unresponsive: bool,
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new(connection: Arc<Connection>, config: &HeartbeatConfig) -> Self {
        Self {
            connection,
            interval: config.interval().max(MIN_PERIOD),
            latency_log_interval: config.latency_log_interval().max(MIN_PERIOD),
            terminate_unresponsive: config.terminate_unresponsive,
        }
    }

    /// Run until the connection closes or is reaped
    pub async fn run(self) -> HeartbeatExit {
        let connection = &self.connection;

        connection.stamp_ping();
        if self.ping().is_err() {
            return HeartbeatExit::Closed;
        }

        let start = Instant::now();
        let mut ping_tick = interval_at(start + self.interval, self.interval);
        let mut log_tick = interval_at(
            start + self.latency_log_interval,
            self.latency_log_interval,
        );
        ping_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ping_tick.tick() => {
                    if self.terminate_unresponsive && !connection.is_alive() {
                        tracing::warn!(
                            connection_id = %connection.id(),
                            "Connection unresponsive, closing"
                        );
                        connection.close();
                        return HeartbeatExit::Unresponsive;
                    }

                    let was_alive = connection.begin_heartbeat();
                    match self.ping() {
                        Ok(true) => {}
                        Ok(false) => connection.cancel_heartbeat(was_alive),
                        Err(_) => return HeartbeatExit::Closed,
                    }
                }

                _ = log_tick.tick() => {
                    tracing::info!(
                        latency_ms = ?connection.latency_ms(),
                        role = %connection.role(),
                        user_id = ?connection.user_id(),
                        connection_id = %connection.id(),
                        "Connection latency"
                    );
                }
            }
        }
    }

    /// Queue a ping. `Ok(false)` means the buffer was full and the ping was skipped.
    fn ping(&self) -> Result<bool, SendError> {
        match self.connection.send(OutboundFrame::Ping) {
            Ok(()) => Ok(true),
            Err(SendError::Full) => {
                tracing::debug!(connection_id = %self.connection.id(), "Ping skipped, buffer full");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
