//! Built-in `gateway` controller
//!
//! Always registered, so every deployment can query gateway status, inspect its
//! own connection and authenticate it.

use super::local::{HandlerContext, HandlerRegistry, LocalHandler};
use super::routes::GATEWAY_CONTROLLER;
use super::{HandlerError, HandlerResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use switchboard_core::{Envelope, ResponseData};

/// Register the built-in operations, replacing any user handler with the same name
pub fn register(registry: &mut HandlerRegistry) {
    registry
        .register(GATEWAY_CONTROLLER, "status", GatewayStatusHandler)
        .register(GATEWAY_CONTROLLER, "connection", ConnectionInfoHandler)
        .register(GATEWAY_CONTROLLER, "authenticate", AuthenticateHandler);
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Connected clients, backend states and in-flight transactions
pub struct GatewayStatusHandler;

#[async_trait]
impl LocalHandler for GatewayStatusHandler {
    async fn handle(&self, _request: &Envelope, ctx: &HandlerContext) -> HandlerResult<ResponseData> {
        let state = &ctx.state;
        let services: Map<String, Value> = state
            .services
            .states()
            .into_iter()
            .map(|(name, s)| (name, Value::from(s.as_str())))
            .collect();

        Ok(ResponseData::ok_with(object(json!({
            "connections": state.connections.connection_count(),
            "authenticated": state.connections.authenticated_count(),
            "transactions": state.transactions.len(),
            "services": services,
        }))))
    }
}

/// The caller's own connection
pub struct ConnectionInfoHandler;

#[async_trait]
impl LocalHandler for ConnectionInfoHandler {
    async fn handle(&self, _request: &Envelope, ctx: &HandlerContext) -> HandlerResult<ResponseData> {
        let connection = &ctx.connection;

        Ok(ResponseData::ok_with(object(json!({
            "connection_id": connection.id(),
            "role": connection.role(),
            "user_id": connection.user_id(),
            "latency_ms": connection.latency_ms(),
            "alive": connection.is_alive(),
        }))))
    }
}

/// Verify `token` and adopt the resulting identity for the connection
pub struct AuthenticateHandler;

#[async_trait]
impl LocalHandler for AuthenticateHandler {
    async fn handle(&self, request: &Envelope, ctx: &HandlerContext) -> HandlerResult<ResponseData> {
        let token = request
            .payload
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| HandlerError::InvalidPayload("Missing token".to_string()))?;

        let identity = ctx.state.verifier.verify(token, &ctx.state.signing_keys)?;

        let connection_id = ctx.connection.id();
        if !ctx.state.connections.authenticate_connection(
            connection_id,
            identity.role.clone(),
            Some(identity.id.clone()),
        ) {
            return Err(HandlerError::Internal(format!(
                "Connection {connection_id} is not registered"
            )));
        }

        tracing::info!(
            connection_id = %connection_id,
            role = %identity.role,
            user_id = %identity.id,
            "Connection authenticated"
        );

        Ok(ResponseData::ok_with(object(json!({
            "role": identity.role,
            "id": identity.id,
        }))))
    }
}
