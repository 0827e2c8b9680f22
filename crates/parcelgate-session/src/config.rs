//! Session timing configuration and per-role profiles.

use std::time::Duration;

use parcelgate_protocol::Role;
use parcelgate_timer::Backoff;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing knobs for one session.
///
/// Every field has a default, so a partial TOML table such as
/// `inactivity_timeout_secs = 600` is enough to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time before the user is logged out.
    pub inactivity_timeout_secs: u64,

    /// How long before expiry the silent refresh fires.
    pub refresh_buffer_ms: u64,

    /// Hard deadline for every backend call.
    pub request_timeout_secs: u64,

    /// Retries for a refresh that failed on a transient error. Once they
    /// run out the session is treated as expired.
    pub refresh_max_retries: u32,

    pub refresh_backoff_base_ms: u64,
    pub refresh_backoff_max_ms: u64,

    /// When set, user activity re-checks the session with the backend at
    /// most once per this many seconds. Off by default.
    pub activity_recheck_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 900,
            refresh_buffer_ms: 3_000,
            request_timeout_secs: 8,
            refresh_max_retries: 3,
            refresh_backoff_base_ms: 1_000,
            refresh_backoff_max_ms: 30_000,
            activity_recheck_secs: None,
        }
    }
}

impl SessionConfig {
    /// Returns a copy with out-of-range values pulled back into range.
    ///
    /// A zero inactivity window or request timeout would log the user out
    /// (or fail every call) immediately, so both are raised to one second.
    /// A zero recheck interval means "off".
    pub fn validated(mut self) -> Self {
        if self.inactivity_timeout_secs == 0 {
            tracing::warn!("inactivity_timeout_secs = 0 is not usable, using 1");
            self.inactivity_timeout_secs = 1;
        }
        if self.request_timeout_secs == 0 {
            tracing::warn!("request_timeout_secs = 0 is not usable, using 1");
            self.request_timeout_secs = 1;
        }
        if self.refresh_backoff_max_ms < self.refresh_backoff_base_ms {
            self.refresh_backoff_max_ms = self.refresh_backoff_base_ms;
        }
        if self.activity_recheck_secs == Some(0) {
            self.activity_recheck_secs = None;
        }
        self
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn refresh_buffer(&self) -> Duration {
        Duration::from_millis(self.refresh_buffer_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Backoff policy for refresh retries.
    pub fn refresh_backoff(&self) -> Backoff {
        Backoff {
            base: Duration::from_millis(self.refresh_backoff_base_ms),
            max: Duration::from_millis(self.refresh_backoff_max_ms),
            ..Backoff::default()
        }
    }

    pub fn activity_recheck(&self) -> Option<Duration> {
        self.activity_recheck_secs.map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// RoleProfile
// ---------------------------------------------------------------------------

/// Where each portal sends a logged-out user.
pub fn default_login_route(role: Role) -> &'static str {
    match role {
        Role::Customer => "/login",
        Role::Staff => "/staff/login",
        Role::Admin => "/admin/login",
    }
}

/// Everything that differs between the three portals' sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleProfile {
    pub role: Role,
    pub login_route: String,
    pub config: SessionConfig,
}

impl RoleProfile {
    /// Profile with the role's default login route and default timings.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            login_route: default_login_route(role).to_string(),
            config: SessionConfig::default(),
        }
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Replaces the timings (validated).
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config.validated();
        self
    }
}
