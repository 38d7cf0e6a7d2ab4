//! Routing descriptor
//!
//! Declarative map from `(resource, action)` to a `(controller, operation)` pair,
//! loaded once at startup:
//!
//! ```yaml
//! resources:
//!   profile:
//!     controller: users
//!     actions:
//!       retrieve:
//!         operation: get_profile
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use switchboard_common::AppError;

/// Name of the built-in controller
pub const GATEWAY_CONTROLLER: &str = "gateway";

/// Routing descriptor for local dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoutingDescriptor {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRoute>,
}

/// Routes for one resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceRoute {
    /// Controller implementing the resource
    pub controller: String,

    #[serde(default)]
    pub actions: BTreeMap<String, ActionRoute>,
}

/// Operation run for one action
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionRoute {
    pub operation: String,
}

/// One flattened descriptor entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry<'a> {
    pub resource: &'a str,
    pub action: &'a str,
    pub controller: &'a str,
    pub operation: &'a str,
}

impl RoutingDescriptor {
    /// Load a descriptor file; the format follows the file extension
    pub fn load(path: &str) -> Result<Self, AppError> {
        let descriptor = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| AppError::routing(format!("{path}: {e}")))?;

        tracing::info!(
            path = %path,
            resources = descriptor.resources.len(),
            "Routing descriptor loaded"
        );

        Ok(descriptor)
    }

    /// Parse a descriptor from a string
    pub fn parse(content: &str, format: config::FileFormat) -> Result<Self, AppError> {
        config::Config::builder()
            .add_source(config::File::from_str(content, format))
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(AppError::routing)
    }

    /// Routes served by the built-in controller
    #[must_use]
    pub fn builtin() -> Self {
        let route = |action: &str, operation: &str| {
            ResourceRoute {
                controller: GATEWAY_CONTROLLER.to_string(),
                actions: BTreeMap::from([(
                    action.to_string(),
                    ActionRoute {
                        operation: operation.to_string(),
                    },
                )]),
            }
        };

        Self {
            resources: BTreeMap::from([
                ("gateway".to_string(), route("retrieve", "status")),
                ("connection".to_string(), route("retrieve", "connection")),
                ("session".to_string(), route("crt_updt", "authenticate")),
            ]),
        }
    }

    /// Merge `other` into `self`; resources in `other` replace those in `self`
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.resources.extend(other.resources);
        self
    }

    /// All `(resource, action)` entries
    pub fn entries(&self) -> impl Iterator<Item = RouteEntry<'_>> {
        self.resources.iter().flat_map(|(resource, route)| {
            route.actions.iter().map(move |(action, action_route)| RouteEntry {
                resource,
                action,
                controller: &route.controller,
                operation: &action_route.operation,
            })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
