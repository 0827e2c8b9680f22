use parcelgate_protocol::ProtocolError;

/// Errors that can occur talking to the auth backend.
///
/// The session layer never looks at HTTP details; it only asks two
/// questions, answered by [`is_auth`](Self::is_auth) and
/// [`is_transient`](Self::is_transient).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// 401: the cookie is missing, expired or revoked.
    #[error("unauthorized")]
    Unauthorized,

    /// 403: the credential is valid but not for this portal.
    #[error("forbidden")]
    Forbidden,

    /// 5xx from the backend or a proxy in front of it.
    #[error("server error (status {0})")]
    Server(u16),

    /// Any other non-success status.
    #[error("request rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },

    /// No response within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection refused, reset, DNS failure...
    #[error("network error: {0}")]
    Network(String),

    /// The response body didn't have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The request couldn't be built (bad base URL, TLS setup...).
    #[error("client error: {0}")]
    Client(String),
}

impl ApiError {
    /// `true` for the expected "your session is gone" answers.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden)
    }

    /// `true` when trying again later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Server(_) | Self::Timeout | Self::Network(_) => true,
            Self::Rejected { status, .. } => matches!(status, 408 | 429),
            _ => false,
        }
    }

    /// Maps a non-success HTTP status to the matching variant.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            500..=599 => Self::Server(status),
            _ => Self::Rejected {
                status,
                body: body.into(),
            },
        }
    }
}

impl From<ProtocolError> for ApiError {
    fn from(err: ProtocolError) -> Self {
        Self::Malformed(err.to_string())
    }
}
