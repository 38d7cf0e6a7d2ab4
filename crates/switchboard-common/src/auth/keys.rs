//! Identity-provider signing keys
//!
//! The gateway fetches the provider's JWKS document once at startup. Failing to
//! obtain it is fatal.

use crate::error::AppError;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use std::time::Duration;

/// Timeout for the one-time key fetch
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Signing keys published by the identity provider
#[derive(Debug, Clone)]
pub struct SigningKeys {
    set: JwkSet,
}

impl SigningKeys {
    /// Wrap an already parsed key set
    #[must_use]
    pub fn new(set: JwkSet) -> Self {
        Self { set }
    }

    /// A key set with no keys
    #[must_use]
    pub fn empty() -> Self {
        Self::new(JwkSet { keys: Vec::new() })
    }

    /// Parse a JWKS document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json).map(Self::new)
    }

    /// Find a key by its `kid`
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.set.find(kid)
    }

    /// Key ids of all keys that carry one
    #[must_use]
    pub fn key_ids(&self) -> Vec<&str> {
        self.set
            .keys
            .iter()
            .filter_map(|k| k.common.key_id.as_deref())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.set.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.keys.is_empty()
    }
}

/// JWKS location of a Cognito-style user pool
#[must_use]
pub fn jwks_url_for_pool(region: &str, pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{pool_id}/.well-known/jwks.json")
}

/// Fetch the signing keys from the identity provider
pub async fn fetch_signing_keys(url: &str) -> Result<SigningKeys, AppError> {
    let key_fetch = |reason: String| AppError::KeyFetch {
        url: url.to_string(),
        reason,
    };

    tracing::info!(url = %url, "Fetching identity provider signing keys");

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| key_fetch(e.to_string()))?;

    let set: JwkSet = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| key_fetch(e.to_string()))?
        .json()
        .await
        .map_err(|e| key_fetch(e.to_string()))?;

    let keys = SigningKeys::new(set);

    tracing::debug!(count = keys.len(), key_ids = ?keys.key_ids(), "Signing keys loaded");

    Ok(keys)
}
