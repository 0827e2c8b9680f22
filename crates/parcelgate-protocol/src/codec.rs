//! Codec trait and implementations for request/response bodies.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The transport reads the HTTP body as bytes and hands them to a codec,
//! so a body that doesn't match the expected shape surfaces as a
//! [`ProtocolError`] instead of a transport failure.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside the HTTP client,
/// which is shared with background refresh tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`). The auth backend speaks
/// nothing else.
///
/// ## Example
///
/// ```rust
/// use parcelgate_protocol::{Codec, JsonCodec, RefreshResponse};
///
/// let body = br#"{ "expiresAt": 1700000000000 }"#;
/// let refreshed: RefreshResponse = JsonCodec.decode(body).unwrap();
/// assert_eq!(refreshed.expires_at.as_millis(), 1_700_000_000_000);
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
