//! Transaction expiry
//!
//! Periodically fails transactions whose backend never replied.

use super::TransactionRouter;
use crate::handlers::DispatchError;
use crate::protocol::send_response;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Status code sent when a transaction times out
pub const TIMEOUT_CODE: u16 = 504;

/// Background task expiring stale transactions
pub struct TransactionSweeper {
    router: Arc<TransactionRouter>,
    timeout: Duration,
    interval: Duration,
}

impl TransactionSweeper {
    #[must_use]
    pub fn new(router: Arc<TransactionRouter>, timeout: Duration, interval: Duration) -> Self {
        Self {
            router,
            timeout,
            interval,
        }
    }

    /// Spawn the sweep loop; it stops when `shutdown` flips to true
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Transaction sweeper stopped");
        })
    }

    /// Expire stale transactions once, notifying their clients
    pub fn sweep(&self) -> usize {
        let expired = self.router.expire(self.timeout);

        for (trans_id, transaction) in &expired {
            tracing::warn!(
                trans_id = %trans_id,
                connection_id = %transaction.connection.id(),
                service = ?transaction.request.service,
                "Transaction timed out"
            );

            send_response(
                &transaction.request,
                DispatchError::Timeout(trans_id.clone()).to_response(),
                &transaction.connection,
            );
        }

        expired.len()
    }
}
