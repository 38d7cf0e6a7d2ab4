//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use switchboard_core::LOCAL_SERVICE;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub services: Vec<ServiceEndpoint>,
    pub routes: RoutesConfig,
    pub identity: IdentityConfig,
    pub heartbeat: HeartbeatConfig,
    pub reconnect: ReconnectConfig,
    pub transactions: TransactionConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Listen address of the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One configured backend service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub url: String,
}

/// Location of the routing descriptor for local dispatch
#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    #[serde(default = "default_routes_file")]
    pub file: String,
}

/// Identity provider settings
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// JWKS document holding the signing keys
    pub jwks_url: String,
}

/// Client heartbeat settings
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_latency_log_interval")]
    pub latency_log_interval_secs: u64,
    /// Close clients that did not answer the previous ping
    #[serde(default)]
    pub terminate_unresponsive: bool,
}

impl HeartbeatConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn latency_log_interval(&self) -> Duration {
        Duration::from_secs(self.latency_log_interval_secs)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval(),
            latency_log_interval_secs: default_latency_log_interval(),
            terminate_unresponsive: false,
        }
    }
}

/// Backend reconnection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_reconnect_delay_ms")]
    pub delay_ms: u64,
    /// `None` retries forever
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_reconnect_delay_ms(),
            max_attempts: None,
        }
    }
}

/// Transaction expiry settings
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
    #[serde(default = "default_transaction_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl TransactionConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_transaction_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "switchboard".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_routes_file() -> String {
    "api/routes.yaml".to_string()
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_latency_log_interval() -> u64 {
    600 // 10 minutes
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_transaction_timeout() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    5
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            app: AppSettings {
                name: var("APP_NAME").unwrap_or_else(default_app_name),
                env: var("APP_ENV")
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: ServerConfig {
                host: var("GATEWAY_HOST").unwrap_or_else(default_host),
                port: parse_var("GATEWAY_PORT", var("GATEWAY_PORT"))?
                    .ok_or(ConfigError::MissingVar("GATEWAY_PORT"))?,
            },
            services: var("GATEWAY_SERVICES")
                .map(|raw| parse_services(&raw))
                .transpose()?
                .unwrap_or_default(),
            routes: RoutesConfig {
                file: var("GATEWAY_ROUTES_FILE").unwrap_or_else(default_routes_file),
            },
            identity: IdentityConfig {
                jwks_url: match var("IDENTITY_JWKS_URL") {
                    Some(url) => url,
                    None => {
                        let region = var("IDENTITY_POOL_REGION")
                            .ok_or(ConfigError::MissingVar("IDENTITY_JWKS_URL"))?;
                        let pool_id = var("IDENTITY_POOL_ID")
                            .ok_or(ConfigError::MissingVar("IDENTITY_POOL_ID"))?;
                        crate::auth::jwks_url_for_pool(&region, &pool_id)
                    }
                },
            },
            heartbeat: HeartbeatConfig {
                interval_secs: parse_var("HEARTBEAT_INTERVAL_SECS", var("HEARTBEAT_INTERVAL_SECS"))?
                    .unwrap_or_else(default_heartbeat_interval),
                latency_log_interval_secs: parse_var(
                    "LATENCY_LOG_INTERVAL_SECS",
                    var("LATENCY_LOG_INTERVAL_SECS"),
                )?
                .unwrap_or_else(default_latency_log_interval),
                terminate_unresponsive: var("HEARTBEAT_TERMINATE_UNRESPONSIVE")
                    .map(|s| parse_bool("HEARTBEAT_TERMINATE_UNRESPONSIVE", &s))
                    .transpose()?
                    .unwrap_or(false),
            },
            reconnect: ReconnectConfig {
                delay_ms: parse_var("SERVICE_RECONNECT_DELAY_MS", var("SERVICE_RECONNECT_DELAY_MS"))?
                    .unwrap_or_else(default_reconnect_delay_ms),
                max_attempts: parse_var(
                    "SERVICE_RECONNECT_MAX_ATTEMPTS",
                    var("SERVICE_RECONNECT_MAX_ATTEMPTS"),
                )?,
            },
            transactions: TransactionConfig {
                timeout_secs: parse_var("TRANSACTION_TIMEOUT_SECS", var("TRANSACTION_TIMEOUT_SECS"))?
                    .unwrap_or_else(default_transaction_timeout),
                sweep_interval_secs: parse_var(
                    "TRANSACTION_SWEEP_INTERVAL_SECS",
                    var("TRANSACTION_SWEEP_INTERVAL_SECS"),
                )?
                .unwrap_or_else(default_sweep_interval),
            },
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    value
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(name, s.clone()))
        })
        .transpose()
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(name, value.to_string())),
    }
}

/// Parse the backend table, `name=url` pairs separated by commas
fn parse_services(raw: &str) -> Result<Vec<ServiceEndpoint>, ConfigError> {
    let mut seen = HashSet::new();
    let mut services = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, url) = entry
            .split_once('=')
            .map(|(n, u)| (n.trim(), u.trim()))
            .filter(|(n, u)| !n.is_empty() && !u.is_empty())
            .ok_or_else(|| ConfigError::InvalidValue("GATEWAY_SERVICES", entry.to_string()))?;

        if name == LOCAL_SERVICE {
            return Err(ConfigError::ReservedServiceName(name.to_string()));
        }
        if !seen.insert(name.to_string()) {
            return Err(ConfigError::DuplicateService(name.to_string()));
        }

        services.push(ServiceEndpoint {
            name: name.to_string(),
            url: url.to_string(),
        });
    }

    Ok(services)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Service name {0} is reserved for local dispatch")]
    ReservedServiceName(String),

    #[error("Service {0} is configured more than once")]
    DuplicateService(String),
}
