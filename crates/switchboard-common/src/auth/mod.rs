//! Identity-provider signing keys and the token verification capability

mod keys;
mod verifier;

pub use keys::{fetch_signing_keys, jwks_url_for_pool, SigningKeys};
pub use verifier::{AuthError, TokenVerifier, UnconfiguredVerifier, VerifiedIdentity};
