//! Error types for the session layer.

use parcelgate_protocol::Role;
use parcelgate_transport::ApiError;

/// Errors returned to callers of a [`SessionHandle`](crate::SessionHandle).
///
/// Lifecycle failures (expired refresh, failed bootstrap) never show up
/// here: the session handles those itself by logging out. Only operations
/// a caller explicitly asked for can fail.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backend rejected the credentials (401/403 on login).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The backend couldn't be reached or answered unexpectedly.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The session task has stopped (shutdown, or every handle dropped).
    #[error("{0} session is no longer running")]
    Unavailable(Role),
}
