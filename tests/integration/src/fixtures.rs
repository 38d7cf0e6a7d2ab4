//! Test fixtures
//!
//! Request builders, a table-driven token verifier and a recording local
//! handler shared by the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use switchboard_common::{AuthError, SigningKeys, TokenVerifier, VerifiedIdentity};
use switchboard_core::{Envelope, ResponseData, Role, UserContext, LOCAL_SERVICE};
use switchboard_gateway::{HandlerContext, HandlerResult, LocalHandler};

/// Counter for unique transaction ids
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique transaction id for a test request
pub fn unique_trans_id() -> String {
    format!("t-{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Two RSA signing keys in JWKS form
pub const SAMPLE_JWKS: &str = r#"{
    "keys": [
        {"kty": "RSA", "kid": "test-key-1", "alg": "RS256", "use": "sig", "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw", "e": "AQAB"},
        {"kty": "RSA", "kid": "test-key-2", "alg": "RS256", "use": "sig", "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw", "e": "AQAB"}
    ]
}"#;

/// Routing descriptor with one custom local route
pub const PROFILE_ROUTES: &str = r#"
resources:
  profile:
    controller: profiles
    actions:
      retrieve:
        operation: show
"#;

/// Request envelope for `service`
pub fn request(trans_id: &str, service: &str, resource: &str, action: &str) -> Value {
    json!({
        "trans_id": trans_id,
        "service": service,
        "resource": resource,
        "action": action,
    })
}

/// Request envelope for the in-process handlers
pub fn local_request(trans_id: &str, resource: &str, action: &str) -> Value {
    request(trans_id, LOCAL_SERVICE, resource, action)
}

/// Verifier that maps known tokens to fixed identities
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    identities: HashMap<String, (String, String)>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, token: &str, role: &str, id: &str) -> Self {
        self.identities
            .insert(token.to_string(), (role.to_string(), id.to_string()));
        self
    }
}

impl TokenVerifier for TokenTable {
    fn verify(&self, token: &str, _keys: &SigningKeys) -> Result<VerifiedIdentity, AuthError> {
        self.identities
            .get(token)
            .map(|(role, id)| VerifiedIdentity {
                role: Role::from(role.as_str()),
                id: id.clone(),
            })
            .ok_or_else(|| AuthError::InvalidToken(format!("unknown token {token}")))
    }
}

/// Local handler that records every call
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<AtomicUsize>,
    last_user: Arc<Mutex<Option<UserContext>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Caller context of the most recent call
    pub fn last_user(&self) -> Option<UserContext> {
        self.last_user.lock().clone()
    }
}

#[async_trait]
impl LocalHandler for Recorder {
    async fn handle(&self, request: &Envelope, _ctx: &HandlerContext) -> HandlerResult<ResponseData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_user.lock() = request.user.clone();

        let mut data = serde_json::Map::new();
        data.insert("handled".to_string(), Value::Bool(true));
        Ok(ResponseData::ok_with(data))
    }
}
