//! Gateway protocol definitions
//!
//! Frames queued for a client socket and construction of gateway responses.

mod outbound;
mod response;

pub use outbound::OutboundFrame;
pub use response::{build_response, send_response};
