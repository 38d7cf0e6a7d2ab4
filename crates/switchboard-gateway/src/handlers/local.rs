//! Local dispatch
//!
//! Requests addressed to the reserved `_server_` service are answered in-process
//! by a [`LocalHandler`]. The routing descriptor is resolved against the handler
//! registry once at startup so a missing handler fails fast.

use super::routes::RoutingDescriptor;
use super::HandlerResult;
use crate::connection::Connection;
use crate::server::GatewayState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use switchboard_common::AppError;
use switchboard_core::{Envelope, RequestAction, ResponseData};

/// What a local handler can see of the request's surroundings
#[derive(Clone)]
pub struct HandlerContext {
    /// Connection that sent the request
    pub connection: Arc<Connection>,

    /// Gateway context
    pub state: GatewayState,
}

/// In-process handler for one `(controller, operation)` pair
#[async_trait]
pub trait LocalHandler: Send + Sync {
    async fn handle(&self, request: &Envelope, ctx: &HandlerContext) -> HandlerResult<ResponseData>;
}

type HandlerKey = (String, String);

/// Descriptor keys arrive lowercased from the config loader
fn key(a: &str, b: &str) -> HandlerKey {
    (a.to_ascii_lowercase(), b.to_ascii_lowercase())
}

/// Handlers available to the routing descriptor
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKey, Arc<dyn LocalHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` as `controller.operation`, replacing any previous one
    pub fn register(
        &mut self,
        controller: &str,
        operation: &str,
        handler: impl LocalHandler + 'static,
    ) -> &mut Self {
        self.handlers
            .insert(key(controller, operation), Arc::new(handler));
        self
    }

    /// Builder form of [`register`](Self::register)
    #[must_use]
    pub fn with(mut self, controller: &str, operation: &str, handler: impl LocalHandler + 'static) -> Self {
        self.register(controller, operation, handler);
        self
    }

    pub fn get(&self, controller: &str, operation: &str) -> Option<Arc<dyn LocalHandler>> {
        self.handlers.get(&key(controller, operation)).cloned()
    }

    pub fn contains(&self, controller: &str, operation: &str) -> bool {
        self.handlers.contains_key(&key(controller, operation))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self
            .handlers
            .keys()
            .map(|(c, o)| format!("{c}.{o}"))
            .collect();
        keys.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &keys)
            .finish()
    }
}

/// A resolved local route
#[derive(Clone)]
pub struct LocalRoute {
    pub controller: String,
    pub operation: String,
    pub handler: Arc<dyn LocalHandler>,
}

impl fmt::Debug for LocalRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalRoute")
            .field("controller", &self.controller)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Validated `(resource, action)` table
#[derive(Debug, Clone, Default)]
pub struct LocalRoutes {
    routes: HashMap<HandlerKey, LocalRoute>,
}

impl LocalRoutes {
    /// Resolve every descriptor entry against `registry`.
    ///
    /// Fails if an action is not one of the request actions with a response name,
    /// or if an entry names a handler that is not registered.
    pub fn build(descriptor: &RoutingDescriptor, registry: &HandlerRegistry) -> Result<Self, AppError> {
        let mut routes = HashMap::new();
        let mut problems = Vec::new();

        for entry in descriptor.entries() {
            if RequestAction::parse(&entry.action.to_ascii_lowercase()).is_none() {
                problems.push(format!(
                    "{}/{}: unsupported action",
                    entry.resource, entry.action
                ));
                continue;
            }

            match registry.get(entry.controller, entry.operation) {
                Some(handler) => {
                    routes.insert(
                        key(entry.resource, entry.action),
                        LocalRoute {
                            controller: entry.controller.to_string(),
                            operation: entry.operation.to_string(),
                            handler,
                        },
                    );
                }
                None => problems.push(format!(
                    "{}/{}: no handler registered for {}.{}",
                    entry.resource, entry.action, entry.controller, entry.operation
                )),
            }
        }

        if !problems.is_empty() {
            return Err(AppError::routing(problems.join("; ")));
        }

        tracing::debug!(routes = routes.len(), "Local routes resolved");

        Ok(Self { routes })
    }

    /// Look up the route for `resource`/`action`, matching case exactly
    #[must_use]
    pub fn resolve(&self, resource: &str, action: &str) -> Option<&LocalRoute> {
        self.routes.get(&(resource.to_string(), action.to_string()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
