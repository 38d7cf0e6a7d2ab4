//! Response action names
//!
//! Every request action has a fixed pair of response names, one for success
//! (`code == 200`) and one for failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status code that marks a response as successful
pub const SUCCESS_CODE: u16 = 200;

/// Actions a client may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    Retrieve,
    CrtUpdt,
    Delete,
    Patch,
    Flush,
}

impl RequestAction {
    /// All actions in table order
    pub const ALL: [Self; 5] = [
        Self::Retrieve,
        Self::CrtUpdt,
        Self::Delete,
        Self::Patch,
        Self::Flush,
    ];

    /// Wire name of the action
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retrieve => "retrieve",
            Self::CrtUpdt => "crt_updt",
            Self::Delete => "delete",
            Self::Patch => "patch",
            Self::Flush => "flush",
        }
    }

    /// Parse a wire name
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "retrieve" => Some(Self::Retrieve),
            "crt_updt" => Some(Self::CrtUpdt),
            "delete" => Some(Self::Delete),
            "patch" => Some(Self::Patch),
            "flush" => Some(Self::Flush),
            _ => None,
        }
    }

    /// Response action name for this request action
    #[must_use]
    pub fn response_name(self, success: bool) -> &'static str {
        match (self, success) {
            (Self::Retrieve, true) => "RETRIEVED",
            (Self::Retrieve, false) => "RETRIEVE_FAIL",
            (Self::CrtUpdt, true) => "CRT_UPDTD",
            (Self::CrtUpdt, false) => "CRT_UPDT_FAIL",
            (Self::Delete, true) => "DELETED",
            (Self::Delete, false) => "DELETE_FAIL",
            (Self::Patch, true) => "PATCHED",
            (Self::Patch, false) => "PATCH_FAIL",
            (Self::Flush, true) => "FLUSHED",
            (Self::Flush, false) => "FLUSH_FAIL",
        }
    }
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an action outside the table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for RequestAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// Map a request action and response code to the response action name.
///
/// Returns `None` for actions outside the table (including a missing action).
#[must_use]
pub fn response_action_name(action: Option<&str>, code: u16) -> Option<&'static str> {
    action
        .and_then(RequestAction::parse)
        .map(|a| a.response_name(code == SUCCESS_CODE))
}
