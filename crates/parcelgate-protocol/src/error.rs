//! Error types for the protocol layer.
//!
//! Each crate in parcelgate defines its own error enum. When you see a
//! `ProtocolError`, the problem is the shape of a body, not the network
//! or the session state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: an HTML error page where JSON was expected,
    /// a missing `expiresAt`, or a principal that isn't an object.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The body parsed but violates a protocol rule, e.g. a role
    /// name the portal doesn't know.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
