//! Codec trait and implementations for serializing/deserializing frames.
//!
//! The server never calls `serde_json` directly; it goes through a
//! [`Codec`]. Swapping the wire format later (e.g. a binary codec for
//! bandwidth) touches this module and nothing else.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance lives in the shared
/// server state and is used from every connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be represented
    /// in this format (JSON, for instance, has no NaN).
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or
    /// don't match `T`.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON via `serde_json`.
///
/// ```rust
/// use plaza_protocol::{Codec, JsonCodec, ServerEvent};
///
/// let bytes = JsonCodec.encode(&ServerEvent::Pong).unwrap();
/// assert_eq!(bytes, br#"{"event":"pong"}"#);
///
/// let back: ServerEvent = JsonCodec.decode(&bytes).unwrap();
/// assert_eq!(back, ServerEvent::Pong);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
