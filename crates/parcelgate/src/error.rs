//! Unified error type for the parcelgate facade.

use parcelgate_protocol::{ProtocolError, Role};
use parcelgate_session::SessionError;
use parcelgate_transport::ApiError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` lift sub-crate errors, so a front end
/// built on [`Portal`](crate::Portal) deals with this one type.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// The configuration is readable but doesn't make sense.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A role the configuration leaves disabled was asked for.
    #[error("the {0} portal is not enabled")]
    RoleDisabled(Role),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
