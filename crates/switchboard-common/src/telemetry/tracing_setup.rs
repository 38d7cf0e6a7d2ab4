//! Tracing subscriber setup
//!
//! `RUST_LOG` always wins; otherwise the directive of the selected
//! [`TracingConfig`] applies.

use crate::config::Environment;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer, Registry,
};

/// Socket libraries log every frame at debug level
const QUIET_SOCKETS: &str = "tungstenite=info,tokio_tungstenite=info";

/// Log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-field lines
    Pretty,
    /// One JSON object per event
    Json,
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub directive: String,
    pub format: LogFormat,
    /// Include file and line numbers
    pub file_line: bool,
    /// Emit span open/close events
    pub span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            directive: format!("info,{QUIET_SOCKETS}"),
            format: LogFormat::Pretty,
            file_line: true,
            span_events: false,
        }
    }
}

impl TracingConfig {
    /// Debug output for the gateway crates
    #[must_use]
    pub fn development() -> Self {
        Self {
            directive: format!("info,switchboard_gateway=debug,tower_http=debug,{QUIET_SOCKETS}"),
            format: LogFormat::Pretty,
            file_line: true,
            span_events: true,
        }
    }

    /// Structured JSON at info level
    #[must_use]
    pub fn production() -> Self {
        Self {
            directive: format!("info,{QUIET_SOCKETS}"),
            format: LogFormat::Json,
            file_line: false,
            span_events: false,
        }
    }

    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Production => Self::production(),
            Environment::Staging => Self::default(),
            Environment::Development => Self::development(),
        }
    }

    /// Replace the fallback filter directive
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.directive))
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer()
            .with_file(self.file_line)
            .with_line_number(self.file_line)
            .with_span_events(self.span_events());

        match self.format {
            LogFormat::Pretty => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        }
    }
}

/// Install the default subscriber
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Install a subscriber built from `config`.
///
/// Fails if a global subscriber is already set.
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    install(&config).map_err(|_| TracingError::AlreadyInitialized)
}

fn install(config: &TracingConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.filter())
        .try_init()
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
