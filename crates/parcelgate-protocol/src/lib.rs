//! Wire protocol for the parcelgate portals.
//!
//! This crate defines what the portal client and the auth backend exchange:
//!
//! - **Types** ([`Principal`], [`ExpiresAt`], [`StatusResponse`], etc.) —
//!   the request and response bodies of the auth endpoints.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those bodies are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (HTTP) and session
//! (lifecycle state machine). It doesn't know about timers or cookies;
//! it only knows the shape of the data.
//!
//! ```text
//! Transport (HTTP bytes) → Protocol (typed bodies) → Session (lifecycle)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    Credentials, ExpiresAt, LoginResponse, Principal, PrincipalId,
    RefreshResponse, Role, StatusResponse,
};
