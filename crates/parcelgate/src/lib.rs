//! # Parcelgate
//!
//! Session lifecycle for the parcel-delivery portals: one customer, one
//! staff and one admin portal, all authenticated by an HTTP-only session
//! cookie.
//!
//! Each enabled role gets its own session task which
//!
//! - checks on startup whether the cookie still belongs to someone,
//! - silently refreshes the access credential shortly before it expires,
//! - logs the user out after a window without activity,
//! - and, on logout, tells the embedding shell what to show and where to go.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parcelgate::prelude::*;
//!
//! # async fn run() -> Result<(), PortalError> {
//! let config = PortalConfig::from_file("portal.toml")?;
//! init_tracing(&config.logging)?;
//!
//! let (shell, mut effects) = ChannelShell::new();
//! let portal = Portal::start(&config, shell)?;
//!
//! let staff = portal.session(Role::Staff)?;
//! if !staff.ready().await.is_authenticated() {
//!     staff.login(Credentials::new("dispatch", "secret")).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod logging;
mod portal;

pub use config::{PortalConfig, RoleSection};
pub use error::PortalError;
pub use logging::{LogFormat, LoggingConfig, init_tracing};
pub use portal::Portal;

pub mod prelude {
    //! Everything a portal front end usually needs.

    pub use crate::{
        LogFormat, LoggingConfig, Portal, PortalConfig, PortalError,
        RoleSection, init_tracing,
    };
    pub use parcelgate_protocol::{
        Credentials, ExpiresAt, Principal, PrincipalId, Role,
    };
    pub use parcelgate_session::{
        ActivityKind, ActivityMonitor, ActivitySink, ChannelShell,
        LogoutReason, Navigation, Notification, NotificationLevel, RoleProfile,
        Session, SessionConfig, SessionError, SessionHandle, SessionManager,
        Shell, ShellEvent, TimerReport,
    };
    pub use parcelgate_transport::{ApiError, AuthApi, Endpoints, HttpAuthApi};
}
