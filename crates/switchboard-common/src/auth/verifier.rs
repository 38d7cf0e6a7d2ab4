//! Token verification capability
//!
//! The gateway holds the provider's signing keys but does not define how a
//! token maps to a role. Deployments plug in a [`TokenVerifier`].

use super::SigningKeys;
use switchboard_core::Role;

/// Identity established from a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub role: Role,
    pub id: String,
}

/// Token verification errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token verification is not configured")]
    Unsupported,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("No signing key matches key id {0}")]
    UnknownKey(String),

    #[error("Token expired")]
    TokenExpired,
}

impl AuthError {
    /// Status code sent to the client for this failure
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unsupported => 501,
            Self::InvalidToken(_) | Self::UnknownKey(_) | Self::TokenExpired => 401,
        }
    }
}

/// Verifies a client token against the provider's signing keys
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str, keys: &SigningKeys) -> Result<VerifiedIdentity, AuthError>;
}

/// Verifier used when no verification scheme has been supplied
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredVerifier;

impl TokenVerifier for UnconfiguredVerifier {
    fn verify(&self, _token: &str, _keys: &SigningKeys) -> Result<VerifiedIdentity, AuthError> {
        Err(AuthError::Unsupported)
    }
}
