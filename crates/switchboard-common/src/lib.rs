//! # switchboard-common
//!
//! Shared utilities including configuration, error handling, identity-provider
//! keys, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{
    fetch_signing_keys, AuthError, SigningKeys, TokenVerifier, UnconfiguredVerifier,
    VerifiedIdentity,
};
pub use config::{
    AppConfig, AppSettings, ConfigError, Environment, HeartbeatConfig, IdentityConfig,
    ReconnectConfig, RoutesConfig, ServerConfig, ServiceEndpoint, TransactionConfig,
};
pub use error::{AppError, AppResult};
pub use telemetry::{
    try_init_tracing, try_init_tracing_with_config, LogFormat, TracingConfig, TracingError,
};
