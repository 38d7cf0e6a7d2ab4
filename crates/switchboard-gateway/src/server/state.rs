//! Gateway state
//!
//! The gateway context shared by every connection: registries, backend pool,
//! local routes and the identity-provider keys.

use crate::connection::ConnectionManager;
use crate::handlers::{register_builtin, HandlerRegistry, LocalHandler, LocalRoutes, RoutingDescriptor};
use crate::services::{ReconnectPolicy, ServicePool};
use crate::transaction::{TransactionRouter, TransactionSweeper};
use parking_lot::Mutex;
use std::sync::Arc;
use switchboard_common::{
    AppError, HeartbeatConfig, ServiceEndpoint, SigningKeys, TokenVerifier, TransactionConfig,
    UnconfiguredVerifier,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Gateway application state
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct GatewayState {
    /// Connected clients
    pub connections: Arc<ConnectionManager>,
    /// In-flight transactions
    pub transactions: Arc<TransactionRouter>,
    /// Backend service connections
    pub services: Arc<ServicePool>,
    /// Validated local dispatch table
    pub local_routes: Arc<LocalRoutes>,
    /// Identity-provider signing keys
    pub signing_keys: Arc<SigningKeys>,
    /// Token verification capability
    pub verifier: Arc<dyn TokenVerifier>,
    /// Client heartbeat settings
    pub heartbeat: HeartbeatConfig,
    /// Transaction expiry settings
    pub transaction_config: TransactionConfig,
    shutdown: Arc<watch::Sender<bool>>,
    sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl GatewayState {
    #[must_use]
    pub fn builder() -> GatewayStateBuilder {
        GatewayStateBuilder::default()
    }

    /// Connect to the backends and start expiring transactions
    pub fn start(&self) {
        let shutdown = self.shutdown.subscribe();
        self.services.start(&shutdown);

        let sweeper = TransactionSweeper::new(
            self.transactions.clone(),
            self.transaction_config.timeout(),
            self.transaction_config.sweep_interval(),
        )
        .spawn(shutdown);
        *self.sweeper.lock() = Some(sweeper);

        tracing::info!(services = self.services.len(), "Gateway started");
    }

    /// Receiver that flips to `true` when the gateway shuts down
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Stop background tasks and wait for them
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        self.services.join().await;

        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            if let Err(e) = sweeper.await {
                tracing::error!(error = %e, "Transaction sweeper failed");
            }
        }

        tracing::info!("Gateway stopped");
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("connections", &self.connections)
            .field("transactions", &self.transactions)
            .field("services", &self.services)
            .field("local_routes", &self.local_routes.len())
            .field("signing_keys", &self.signing_keys.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`GatewayState`]
#[derive(Default)]
pub struct GatewayStateBuilder {
    services: Vec<ServiceEndpoint>,
    reconnect: ReconnectPolicy,
    routes: RoutingDescriptor,
    registry: HandlerRegistry,
    signing_keys: Option<SigningKeys>,
    verifier: Option<Arc<dyn TokenVerifier>>,
    heartbeat: HeartbeatConfig,
    transactions: TransactionConfig,
}

impl GatewayStateBuilder {
    /// Backend services to connect to
    #[must_use]
    pub fn services(mut self, services: Vec<ServiceEndpoint>) -> Self {
        self.services = services;
        self
    }

    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Routing descriptor; merged over the built-in routes
    #[must_use]
    pub fn routes(mut self, descriptor: RoutingDescriptor) -> Self {
        self.routes = descriptor;
        self
    }

    /// Register a local handler
    #[must_use]
    pub fn handler(
        mut self,
        controller: &str,
        operation: &str,
        handler: impl LocalHandler + 'static,
    ) -> Self {
        self.registry.register(controller, operation, handler);
        self
    }

    /// Replace the handler registry
    #[must_use]
    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn signing_keys(mut self, keys: SigningKeys) -> Self {
        self.signing_keys = Some(keys);
        self
    }

    #[must_use]
    pub fn verifier(mut self, verifier: impl TokenVerifier + 'static) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    #[must_use]
    pub fn heartbeat(mut self, config: HeartbeatConfig) -> Self {
        self.heartbeat = config;
        self
    }

    #[must_use]
    pub fn transaction_config(mut self, config: TransactionConfig) -> Self {
        self.transactions = config;
        self
    }

    /// Resolve the local routes and assemble the state.
    ///
    /// Nothing is started; call [`GatewayState::start`].
    pub fn build(self) -> Result<GatewayState, AppError> {
        let mut registry = self.registry;
        register_builtin(&mut registry);

        let descriptor = RoutingDescriptor::builtin().merge(self.routes);
        let local_routes = LocalRoutes::build(&descriptor, &registry)?;

        let transactions = TransactionRouter::new_shared();
        let services = ServicePool::new(&self.services, self.reconnect, transactions.clone());
        let (shutdown, _) = watch::channel(false);

        Ok(GatewayState {
            connections: ConnectionManager::new_shared(),
            transactions,
            services: Arc::new(services),
            local_routes: Arc::new(local_routes),
            signing_keys: Arc::new(self.signing_keys.unwrap_or_else(SigningKeys::empty)),
            verifier: self
                .verifier
                .unwrap_or_else(|| Arc::new(UnconfiguredVerifier)),
            heartbeat: self.heartbeat,
            transaction_config: self.transactions,
            shutdown: Arc::new(shutdown),
            sweeper: Arc::new(Mutex::new(None)),
        })
    }
}
