//! Return path for backend replies
//!
//! Matches a reply to its transaction and delivers it to the waiting client.

use crate::handlers::DispatchError;
use crate::transaction::TransactionRouter;
use std::sync::Arc;
use switchboard_core::ServiceReply;

/// Delivers service replies to the connection that issued the transaction
#[derive(Debug, Clone)]
pub struct ReplyRouter {
    transactions: Arc<TransactionRouter>,
}

impl ReplyRouter {
    #[must_use]
    pub fn new(transactions: Arc<TransactionRouter>) -> Self {
        Self { transactions }
    }

    /// Route one reply from `service`, returning its `trans_id` on delivery.
    ///
    /// The transaction is completed before delivery, so a second reply for the
    /// same id is reported as [`DispatchError::UnknownTransaction`].
    pub fn route(&self, service: &str, text: &str) -> Result<String, DispatchError> {
        let mut reply =
            ServiceReply::from_json(text).map_err(|e| DispatchError::MalformedReply(e.to_string()))?;

        let trans_id = reply.trans_id().ok_or(DispatchError::MissingReplyTransId)?;

        let transaction = self
            .transactions
            .complete(&trans_id)
            .ok_or_else(|| DispatchError::UnknownTransaction(trans_id.clone()))?;

        let connection = transaction.connection;
        reply.stamp(
            chrono::Utc::now().timestamp_millis(),
            connection.latency_ms(),
        );

        let json = reply
            .to_json()
            .map_err(|e| DispatchError::MalformedReply(e.to_string()))?;

        if let Err(e) = connection.send_text(json) {
            tracing::warn!(
                service = %service,
                trans_id = %trans_id,
                connection_id = %connection.id(),
                error = %e,
                "Failed to deliver service reply"
            );
        } else {
            tracing::debug!(
                service = %service,
                trans_id = %trans_id,
                connection_id = %connection.id(),
                "Service reply delivered"
            );
        }

        Ok(trans_id)
    }
}
