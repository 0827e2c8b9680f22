//! Portal configuration, loaded from TOML.
//!
//! ```toml
//! base_url = "https://api.parcelgate.example"
//!
//! [logging]
//! level = "info"
//!
//! [staff]
//! login_route = "/staff/login"
//!
//! [staff.session]
//! inactivity_timeout_secs = 600
//! activity_recheck_secs = 120
//!
//! [admin]
//! enabled = false
//! ```
//!
//! Everything except `base_url` is optional.

use std::path::Path;
use std::time::Duration;

use parcelgate_protocol::Role;
use parcelgate_session::{RoleProfile, SessionConfig};
use parcelgate_transport::Endpoints;
use serde::{Deserialize, Serialize};

use crate::{LoggingConfig, PortalError};

/// Settings for one role's portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleSection {
    pub enabled: bool,
    /// Defaults to the role's standard login page.
    pub login_route: Option<String>,
    /// Defaults to `/api/{role}/auth/...`.
    pub endpoints: Option<Endpoints>,
    pub session: SessionConfig,
}

impl Default for RoleSection {
    fn default() -> Self {
        Self {
            enabled: true,
            login_route: None,
            endpoints: None,
            session: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Backend origin every endpoint path is joined onto.
    pub base_url: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub customer: RoleSection,
    #[serde(default)]
    pub staff: RoleSection,
    #[serde(default)]
    pub admin: RoleSection,
}

impl PortalConfig {
    /// All three roles enabled with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            logging: LoggingConfig::default(),
            customer: RoleSection::default(),
            staff: RoleSection::default(),
            admin: RoleSection::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PortalError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PortalError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading portal configuration");
        Self::from_toml_str(&text)
    }

    /// Checks what serde can't: a usable base URL and at least one role.
    pub fn validate(&self) -> Result<(), PortalError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(PortalError::Config(format!(
                "base_url must start with http:// or https://, got {:?}",
                self.base_url
            )));
        }
        if self.enabled_roles().is_empty() {
            return Err(PortalError::Config("every role is disabled".into()));
        }
        Ok(())
    }

    pub fn section(&self, role: Role) -> &RoleSection {
        match role {
            Role::Customer => &self.customer,
            Role::Staff => &self.staff,
            Role::Admin => &self.admin,
        }
    }

    pub fn enabled_roles(&self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.section(*role).enabled)
            .collect()
    }

    pub fn endpoints(&self, role: Role) -> Endpoints {
        self.section(role)
            .endpoints
            .clone()
            .unwrap_or_else(|| Endpoints::for_role(role))
    }

    /// The session profile for `role`, with defaults filled in.
    pub fn profile(&self, role: Role) -> RoleProfile {
        let section = self.section(role);
        let profile = RoleProfile::new(role).with_config(section.session.clone());
        match &section.login_route {
            Some(route) => profile.with_login_route(route.clone()),
            None => profile,
        }
    }

    /// Longest request timeout among the enabled roles. The shared HTTP
    /// client uses it; each session still enforces its own.
    pub fn http_timeout(&self) -> Duration {
        self.enabled_roles()
            .into_iter()
            .map(|role| self.section(role).session.clone().validated().request_timeout())
            .max()
            .unwrap_or(Duration::from_secs(8))
    }
}
