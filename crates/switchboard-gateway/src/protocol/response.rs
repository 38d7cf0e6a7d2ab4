//! Response construction
//!
//! Builds the envelope the gateway itself sends back for a request (local
//! handler results and gateway-side errors) and queues it on the connection.

use super::OutboundFrame;
use crate::connection::Connection;
use switchboard_core::{Envelope, ResponseData, ResponseEnvelope};

/// Build the response envelope for `request` as seen by `connection`
pub fn build_response(
    request: &Envelope,
    data: ResponseData,
    connection: &Connection,
) -> ResponseEnvelope {
    let response = ResponseEnvelope::for_request(request, data, connection.latency_ms());

    if response.action.is_none() {
        tracing::error!(
            connection_id = %connection.id(),
            trans_id = ?request.trans_id,
            action = ?request.action,
            "Request action has no response action name"
        );
    }

    response
}

/// Build and send the response for `request`.
///
/// Sends are best-effort: failures are logged and reported as `false`.
pub fn send_response(request: &Envelope, data: ResponseData, connection: &Connection) -> bool {
    let response = build_response(request, data, connection);

    let json = match response.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(
                connection_id = %connection.id(),
                error = %e,
                "Failed to encode response"
            );
            return false;
        }
    };

    match connection.send(OutboundFrame::Text(json)) {
        Ok(()) => {
            tracing::debug!(
                connection_id = %connection.id(),
                trans_id = ?response.trans_id,
                code = response.response.code,
                "Response sent"
            );
            true
        }
        Err(e) => {
            tracing::warn!(
                connection_id = %connection.id(),
                trans_id = ?response.trans_id,
                error = %e,
                "Failed to send response"
            );
            false
        }
    }
}
