//! Caller roles and the user context attached to forwarded requests

use serde::{Deserialize, Serialize};
use std::fmt;

const ANONYMOUS: &str = "Anonymous";

/// Role of a connected client
///
/// Every connection starts as `Anonymous`; authentication replaces it with the
/// role name issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    Anonymous,
    Authenticated(String),
}

impl Role {
    /// Check if the role is anonymous
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Role name as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Anonymous => ANONYMOUS,
            Self::Authenticated(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        if value.is_empty() || value == ANONYMOUS {
            Self::Anonymous
        } else {
            Self::Authenticated(value)
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Anonymous => ANONYMOUS.to_string(),
            Role::Authenticated(name) => name,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User context copied from the originating connection at dispatch time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub role: Role,
    pub id: Option<String>,
}

impl UserContext {
    #[must_use]
    pub fn new(role: Role, id: Option<String>) -> Self {
        Self { role, id }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(Role::Anonymous, None)
    }
}
