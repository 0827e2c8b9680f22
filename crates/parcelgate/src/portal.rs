//! One session per enabled role, wired to the HTTP backend.

use std::sync::Arc;

use parcelgate_protocol::Role;
use parcelgate_session::{Session, SessionHandle, SessionManager, Shell};
use parcelgate_transport::{AuthApi, HttpAuthApi};

use crate::{PortalConfig, PortalError};

/// The running portals.
///
/// Each enabled role has an independent session task; logging out of the
/// staff portal leaves a customer session in the same process untouched.
#[derive(Debug, Clone)]
pub struct Portal {
    sessions: Vec<SessionHandle>,
}

impl Portal {
    /// Starts a session for every enabled role against the configured
    /// HTTP backend.
    ///
    /// All roles share one HTTP client and therefore one cookie jar, the
    /// way a browser tab shares cookies across pages of one origin.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<S: Shell + Clone>(
        config: &PortalConfig,
        shell: S,
    ) -> Result<Self, PortalError> {
        config.validate()?;
        let roles = config.enabled_roles();
        let first = roles
            .first()
            .copied()
            .ok_or_else(|| PortalError::Config("every role is disabled".into()))?;

        let client = HttpAuthApi::new(
            config.base_url.trim(),
            config.endpoints(first),
            config.http_timeout(),
        )?;

        Self::start_with(config, shell, |role| {
            Arc::new(client.with_endpoints(config.endpoints(role)))
        })
    }

    /// Starts a session for every enabled role, using `api_for` to build
    /// each role's backend.
    pub fn start_with<S, A, F>(
        config: &PortalConfig,
        shell: S,
        mut api_for: F,
    ) -> Result<Self, PortalError>
    where
        S: Shell + Clone,
        A: AuthApi,
        F: FnMut(Role) -> Arc<A>,
    {
        config.validate()?;
        let sessions = config
            .enabled_roles()
            .into_iter()
            .map(|role| {
                tracing::info!(%role, base_url = %config.base_url, "starting portal session");
                SessionManager::new(config.profile(role), api_for(role), shell.clone()).spawn()
            })
            .collect();
        Ok(Self { sessions })
    }

    /// The session of `role`.
    ///
    /// # Errors
    /// [`PortalError::RoleDisabled`] if the configuration disables it.
    pub fn session(&self, role: Role) -> Result<&SessionHandle, PortalError> {
        self.sessions
            .iter()
            .find(|s| s.role() == role)
            .ok_or(PortalError::RoleDisabled(role))
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.sessions.iter().map(SessionHandle::role)
    }

    /// Waits for every session's startup check.
    pub async fn ready(&self) -> Vec<(Role, Session)> {
        let mut out = Vec::with_capacity(self.sessions.len());
        for handle in &self.sessions {
            out.push((handle.role(), handle.ready().await));
        }
        out
    }

    /// Stops every session without logging anyone out on the backend.
    pub async fn shutdown(&self) {
        for handle in &self.sessions {
            if let Err(e) = handle.shutdown().await {
                tracing::debug!(role = %handle.role(), error = %e, "session already stopped");
            }
        }
    }
}
