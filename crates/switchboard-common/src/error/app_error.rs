//! Application error types
//!
//! Process-level errors. Anything surfacing here stops the gateway; per-request
//! failures are handled inside the gateway and never reach this type.

use crate::config::ConfigError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Routing descriptor error: {0}")]
    RoutingDescriptor(String),

    // Identity provider errors
    #[error("Failed to fetch signing keys from {url}: {reason}")]
    KeyFetch { url: String, reason: String },

    // Server errors
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(String),
}

impl AppError {
    /// Create a routing descriptor error
    #[must_use]
    pub fn routing(msg: impl std::fmt::Display) -> Self {
        Self::RoutingDescriptor(msg.to_string())
    }

    /// Check if the error happened before the gateway started serving
    #[must_use]
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::RoutingDescriptor(_) | Self::KeyFetch { .. } | Self::Bind { .. }
        )
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
