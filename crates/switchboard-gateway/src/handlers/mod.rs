//! Request dispatch
//!
//! Validates incoming client envelopes, registers their transactions and sends
//! each one to its backend service or to a local handler.

mod builtin;
mod error;
mod local;
mod routes;

pub use builtin::{AuthenticateHandler, ConnectionInfoHandler, GatewayStatusHandler};
pub use error::{DispatchError, HandlerError, HandlerResult, GATEWAY_ERROR_CODE};
pub use local::{HandlerContext, HandlerRegistry, LocalHandler, LocalRoute, LocalRoutes};
pub use routes::{ActionRoute, ResourceRoute, RouteEntry, RoutingDescriptor, GATEWAY_CONTROLLER};

pub(crate) use builtin::register as register_builtin;

use crate::connection::Connection;
use crate::protocol::send_response;
use crate::server::GatewayState;
use crate::services::PoolError;
use std::sync::Arc;
use switchboard_core::{Envelope, ResponseData};

/// What happened to a client message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Sent to a backend; the reply arrives later
    Forwarded,
    /// Answered by a local handler
    Local { code: u16 },
    /// Answered with a gateway error
    Rejected { code: u16 },
    /// Timed out while a local handler ran; the sweeper sent the only reply
    Expired,
}

/// Dispatch incoming client messages
pub struct MessageDispatcher;

impl MessageDispatcher {
    /// Handle one text frame from a client
    pub async fn handle_text(
        state: &GatewayState,
        connection: &Arc<Connection>,
        text: &str,
    ) -> DispatchOutcome {
        match Envelope::from_json(text) {
            Ok(envelope) => Self::dispatch(state, connection, envelope).await,
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection.id(),
                    error = %e,
                    "Malformed client envelope"
                );
                Self::reject(
                    &Envelope::default(),
                    connection,
                    DispatchError::MalformedEnvelope(e.to_string()),
                )
            }
        }
    }

    /// Dispatch a parsed envelope.
    ///
    /// Every envelope gets exactly one reply: forwarded ones from their backend
    /// (or the expiry sweeper), all others from the gateway before returning.
    /// A local reply that loses the race with the sweeper is dropped.
    pub async fn dispatch(
        state: &GatewayState,
        connection: &Arc<Connection>,
        envelope: Envelope,
    ) -> DispatchOutcome {
        let route = match envelope.route() {
            Ok(route) => route,
            Err(missing) => {
                tracing::warn!(
                    connection_id = %connection.id(),
                    missing = %missing,
                    "Rejected client envelope"
                );
                return Self::reject(&envelope, connection, missing.into());
            }
        };

        let trans_id = route.trans_id.to_string();
        let service = route.service.to_string();
        let is_local = route.is_local();

        let registered = state
            .transactions
            .register(&trans_id, &envelope, connection);

        let forwarded = envelope.with_user(connection.user_context());
        match state.services.send(&service, &forwarded) {
            Ok(()) => {
                tracing::debug!(
                    connection_id = %connection.id(),
                    trans_id = %trans_id,
                    service = %service,
                    resource = ?envelope.resource,
                    action = ?envelope.action,
                    "Request forwarded"
                );
                return DispatchOutcome::Forwarded;
            }
            Err(PoolError::Encode(e)) => {
                tracing::error!(trans_id = %trans_id, service = %service, error = %e, "Failed to encode request");
            }
            Err(e) => {
                tracing::debug!(trans_id = %trans_id, reason = %e, "Service not available");
            }
        }

        let reply = if is_local {
            Self::run_local(state, connection, &envelope).await
        } else {
            tracing::error!(
                connection_id = %connection.id(),
                trans_id = %trans_id,
                service = %service,
                "Unknown service"
            );
            Err(DispatchError::UnknownService(service))
        };

        // The sweeper may have answered while the handler ran
        if registered
            && state
                .transactions
                .complete_owned(&trans_id, connection.id())
                .is_none()
        {
            tracing::warn!(
                connection_id = %connection.id(),
                trans_id = %trans_id,
                "Transaction expired before its local reply, dropping it"
            );
            return DispatchOutcome::Expired;
        }

        match reply {
            Ok(data) => {
                let code = data.code;
                send_response(&envelope, data, connection);
                DispatchOutcome::Local { code }
            }
            Err(e) => Self::reject(&envelope, connection, e),
        }
    }

    async fn run_local(
        state: &GatewayState,
        connection: &Arc<Connection>,
        envelope: &Envelope,
    ) -> Result<ResponseData, DispatchError> {
        let resource = envelope.resource.as_deref().unwrap_or_default();
        let action = envelope.action.as_deref().unwrap_or_default();

        let Some(route) = state.local_routes.resolve(resource, action).cloned() else {
            tracing::error!(
                connection_id = %connection.id(),
                resource = %resource,
                action = %action,
                "No local handler"
            );
            return Err(DispatchError::LocalDispatch {
                resource: resource.to_string(),
                action: action.to_string(),
            });
        };

        let ctx = HandlerContext {
            connection: connection.clone(),
            state: state.clone(),
        };
        let request = envelope.with_user(connection.user_context());

        route.handler.handle(&request, &ctx).await.map_err(|e| {
            tracing::warn!(
                connection_id = %connection.id(),
                controller = %route.controller,
                operation = %route.operation,
                error = %e,
                "Local handler failed"
            );
            DispatchError::Handler(e)
        })
    }

    fn reject(envelope: &Envelope, connection: &Connection, err: DispatchError) -> DispatchOutcome {
        let code = err.status_code();
        send_response(envelope, err.to_response(), connection);
        DispatchOutcome::Rejected { code }
    }
}
