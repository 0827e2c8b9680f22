//! Auth backend seam for the parcelgate portals.
//!
//! Provides the [`AuthApi`] trait (the four calls the session lifecycle
//! needs from the backend) and [`Endpoints`], the per-role paths.
//!
//! # Feature Flags
//!
//! - `http` (default) — [`HttpAuthApi`], a cookie-carrying `reqwest` client

mod error;
#[cfg(feature = "http")]
mod http;

pub use error::ApiError;
#[cfg(feature = "http")]
pub use http::HttpAuthApi;

use std::future::Future;

use parcelgate_protocol::{
    Credentials, LoginResponse, RefreshResponse, Role, StatusResponse,
};
use serde::{Deserialize, Serialize};

/// The auth backend as the session lifecycle sees it.
///
/// All calls are authenticated by the session cookie the implementation
/// carries, not by headers the caller passes. Everything except `login`
/// is safe to retry.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one instance is shared (behind an `Arc`)
///   between the session actor and the background refresh tasks it spawns.
/// - The returned futures are `Send` so those tasks can run on any worker.
///
/// # Example
///
/// ```rust
/// use parcelgate_protocol::{
///     Credentials, LoginResponse, RefreshResponse, StatusResponse,
/// };
/// use parcelgate_transport::{ApiError, AuthApi};
///
/// /// A backend that never has a session. Handy for rendering the
/// /// logged-out screens offline.
/// struct Offline;
///
/// impl AuthApi for Offline {
///     async fn login(&self, _: &Credentials) -> Result<LoginResponse, ApiError> {
///         Err(ApiError::Unauthorized)
///     }
///     async fn status(&self) -> Result<StatusResponse, ApiError> {
///         Err(ApiError::Unauthorized)
///     }
///     async fn refresh(&self) -> Result<RefreshResponse, ApiError> {
///         Err(ApiError::Unauthorized)
///     }
///     async fn logout(&self) -> Result<(), ApiError> {
///         Ok(())
///     }
/// }
/// ```
pub trait AuthApi: Send + Sync + 'static {
    /// `POST login` with the form contents. Sets the session cookie.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<LoginResponse, ApiError>> + Send;

    /// `GET status`: who does the current cookie belong to?
    fn status(
        &self,
    ) -> impl Future<Output = Result<StatusResponse, ApiError>> + Send;

    /// `POST refresh`: silently trade the session cookie for a fresh
    /// access credential.
    fn refresh(
        &self,
    ) -> impl Future<Output = Result<RefreshResponse, ApiError>> + Send;

    /// `POST logout`: revoke the session server-side.
    fn logout(&self) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Paths of the four auth endpoints, relative to the backend base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub login: String,
    pub status: String,
    pub refresh: String,
    pub logout: String,
}

impl Endpoints {
    /// Default layout: `/api/{role}/auth/{login,status,refresh,logout}`.
    pub fn for_role(role: Role) -> Self {
        let base = format!("/api/{}/auth", role.as_str());
        Self {
            login: format!("{base}/login"),
            status: format!("{base}/status"),
            refresh: format!("{base}/refresh"),
            logout: format!("{base}/logout"),
        }
    }
}

/// Joins a base URL and an endpoint path with exactly one `/` between them.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
