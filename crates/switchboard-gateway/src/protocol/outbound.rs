//! Frames queued for a client socket

/// A frame waiting to be written to a client WebSocket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// JSON text frame
    Text(String),
    /// Heartbeat ping
    Ping,
    /// Close the socket
    Close,
}

impl OutboundFrame {
    /// Text payload, if this is a text frame
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}
