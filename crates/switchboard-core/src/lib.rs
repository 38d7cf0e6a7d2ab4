//! # switchboard-core
//!
//! Domain layer: the envelope wire records exchanged with clients and backend
//! services, caller roles, and the response action table.
//! This crate has zero dependencies on infrastructure (sockets, runtime, etc.).

pub mod action;
pub mod envelope;
pub mod role;

pub use action::{response_action_name, RequestAction};
pub use envelope::{
    Envelope, MissingFields, ResponseData, ResponseEnvelope, ServiceReply, ValidatedRoute,
    LOCAL_SERVICE,
};
pub use role::{Role, UserContext};
