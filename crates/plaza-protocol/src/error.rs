//! Error types for the protocol layer.

/// Errors that can occur while encoding or interpreting frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The bytes are not a well-formed frame: invalid JSON, or no
    /// `event` field.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame named a known event but its `data` has the wrong shape
    /// (missing field, wrong JSON type, empty required string).
    #[error("invalid {event} payload: {reason}")]
    InvalidPayload {
        /// The inbound event name, e.g. `"join"`.
        event: &'static str,
        /// Human-readable description of what is wrong.
        reason: String,
    },

    /// The frame named an event the server does not handle.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}
