//! Handler error types

use crate::transaction::TIMEOUT_CODE;
use switchboard_common::AuthError;
use switchboard_core::{MissingFields, ResponseData};
use thiserror::Error;

/// Status code used for every gateway-side failure without a more specific code
pub const GATEWAY_ERROR_CODE: u16 = 500;

/// Per-request dispatch error
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `trans_id` and/or `service` missing
    #[error("{missing}")]
    Validation { missing: MissingFields },

    /// Client frame was not a JSON envelope
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Named service is neither open nor the local sentinel
    #[error("Unknown service {0}")]
    UnknownService(String),

    /// Service reply for a transaction nobody is waiting on
    #[error("Unknown transaction {0}")]
    UnknownTransaction(String),

    /// Service reply without a `trans_id`
    #[error("Service reply without trans_id")]
    MissingReplyTransId,

    /// Service reply was not a JSON object
    #[error("Malformed service reply: {0}")]
    MalformedReply(String),

    /// No local handler for the resource/action pair
    #[error("No local handler for {resource}/{action}")]
    LocalDispatch { resource: String, action: String },

    /// Local handler returned an error
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// Backend never answered
    #[error("Transaction {0} timed out")]
    Timeout(String),
}

impl DispatchError {
    /// Status code sent to the client for this failure
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Handler(e) => e.status_code(),
            Self::Timeout(_) => TIMEOUT_CODE,
            _ => GATEWAY_ERROR_CODE,
        }
    }

    /// Response body for the client
    #[must_use]
    pub fn to_response(&self) -> ResponseData {
        ResponseData::error(self.status_code(), self.to_string())
    }
}

impl From<MissingFields> for DispatchError {
    fn from(missing: MissingFields) -> Self {
        Self::Validation { missing }
    }
}

/// Error returned by a local handler
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Handler-chosen status and message
    #[error("{message}")]
    Status { code: u16, message: String },

    /// Invalid payload received
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Token verification failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    #[must_use]
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Status code sent to the client for this failure
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Status { code, .. } => *code,
            Self::InvalidPayload(_) => 400,
            Self::Auth(e) => e.status_code(),
            Self::Internal(_) => GATEWAY_ERROR_CODE,
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
