//! Envelope wire records
//!
//! Clients and backend services exchange JSON envelopes tagged with a
//! transaction id. Request envelopes carry arbitrary payload fields next to the
//! routing fields; the gateway never interprets the payload.

use crate::action::{response_action_name, SUCCESS_CODE};
use crate::role::UserContext;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Reserved service name that selects an in-process handler instead of a backend
pub const LOCAL_SERVICE: &str = "_server_";

/// Request envelope sent by a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Client-chosen correlation id
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub trans_id: Option<String>,

    /// Target backend service (or [`LOCAL_SERVICE`])
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Caller context, only ever set by the gateway
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserContext>,

    /// Everything else the client sent
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Accept strings and numbers, treat empty strings and other types as absent
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// The two correlation fields every request must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedRoute<'a> {
    pub trans_id: &'a str,
    pub service: &'a str,
}

impl ValidatedRoute<'_> {
    /// Check if the request targets the in-process handlers
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.service == LOCAL_SERVICE
    }
}

/// Required fields missing from a request envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingFields {
    pub trans_id: bool,
    pub service: bool,
}

impl MissingFields {
    /// Names of the missing fields, in wire order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(2);
        if self.trans_id {
            names.push("trans_id");
        }
        if self.service {
            names.push("service");
        }
        names
    }
}

impl fmt::Display for MissingFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Missing {}", self.names().join(", "))
    }
}

impl std::error::Error for MissingFields {}

impl Envelope {
    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Check the correlation fields
    pub fn route(&self) -> Result<ValidatedRoute<'_>, MissingFields> {
        match (self.trans_id.as_deref(), self.service.as_deref()) {
            (Some(trans_id), Some(service)) => Ok(ValidatedRoute { trans_id, service }),
            (trans_id, service) => Err(MissingFields {
                trans_id: trans_id.is_none(),
                service: service.is_none(),
            }),
        }
    }

    /// The routing fields only, without payload or caller context
    #[must_use]
    pub fn routing_header(&self) -> Self {
        Self {
            trans_id: self.trans_id.clone(),
            service: self.service.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
            user: None,
            payload: Map::new(),
        }
    }

    /// Copy of this envelope carrying the given caller context.
    ///
    /// A client-supplied `user` payload key is dropped so the gateway's context
    /// is the only one a backend sees.
    #[must_use]
    pub fn with_user(&self, user: UserContext) -> Self {
        let mut envelope = self.clone();
        envelope.payload.remove("user");
        envelope.user = Some(user);
        envelope
    }
}

/// Result data of a request, sent back under the `response` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    pub code: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ResponseData {
    /// Successful response without data
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: SUCCESS_CODE,
            message: None,
            data: Map::new(),
        }
    }

    /// Successful response carrying data fields
    #[must_use]
    pub fn ok_with(data: Map<String, Value>) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: None,
            data,
        }
    }

    /// Error response with a message
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data: Map::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Response envelope built by the gateway itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trans_id: Option<String>,

    /// Mapped response action name, `null` for actions outside the table
    pub action: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    pub response: ResponseData,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_latency: Option<f64>,
}

impl ResponseEnvelope {
    /// Build the response to `request`
    #[must_use]
    pub fn for_request(
        request: &Envelope,
        response: ResponseData,
        connection_latency: Option<f64>,
    ) -> Self {
        let action = response_action_name(request.action.as_deref(), response.code);
        Self {
            trans_id: request.trans_id.clone(),
            action: action.map(String::from),
            service: request.service.clone(),
            resource: request.resource.clone(),
            response,
            connection_latency,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Envelope received from a backend service.
///
/// Kept as a raw JSON object so it is forwarded to the client untouched apart
/// from the fields the gateway stamps on the return path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceReply(Map<String, Value>);

impl ServiceReply {
    /// Deserialize from JSON string (must be a JSON object)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Transaction id, if present and non-empty
    #[must_use]
    pub fn trans_id(&self) -> Option<String> {
        match self.0.get("trans_id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Stamp the return-path fields
    pub fn stamp(&mut self, service_tstamp: i64, connection_latency: Option<f64>) {
        self.0
            .insert("service_tstamp".to_string(), Value::from(service_tstamp));
        self.0.insert(
            "connection_latency".to_string(),
            connection_latency.map_or(Value::Null, Value::from),
        );
    }

    /// Access a field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ServiceReply {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
