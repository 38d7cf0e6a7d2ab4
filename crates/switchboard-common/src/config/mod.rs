//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, ConfigError, Environment, HeartbeatConfig, IdentityConfig,
    ReconnectConfig, RoutesConfig, ServerConfig, ServiceEndpoint, TransactionConfig,
};
