//! Core types exchanged with the auth backend.
//!
//! Every type here is either a request body, a response body, or a value
//! embedded in one. The backend speaks camelCase JSON and names the
//! principal after the portal (`user`, `staff`, `admin`), so the response
//! types accept all of those spellings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which portal a session belongs to.
///
/// The three portals share one session lifecycle; only endpoints, timeouts
/// and the login route differ per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "Customer", alias = "user")]
    Customer,
    #[serde(alias = "Staff")]
    Staff,
    #[serde(alias = "Admin")]
    Admin,
}

impl Role {
    /// All roles, in portal order.
    pub const ALL: [Role; 3] = [Role::Customer, Role::Staff, Role::Admin];

    /// The lowercase name used in URLs and config sections.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" | "user" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown role {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// Identifier of a principal.
///
/// Backends disagree on whether ids are strings (document ids) or
/// numbers (row ids). Both are accepted and kept as text so the client
/// never does arithmetic on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PrincipalId {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// The authenticated identity held by a session.
///
/// Treated as an immutable value: the session replaces it wholesale on
/// login, refresh and logout, and never edits a field in place. Fields
/// the portal doesn't model (email, phone, branch...) are kept verbatim
/// in `attributes` so views can still display them. A `role` the client
/// doesn't know (`"driver"`) leaves [`role`](Self::role) empty and stays
/// in `attributes` under its original key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPrincipal")]
pub struct Principal {
    #[serde(alias = "_id")]
    pub id: PrincipalId,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawPrincipal {
    #[serde(alias = "_id")]
    id: PrincipalId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: Option<serde_json::Value>,
    #[serde(flatten)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl From<RawPrincipal> for Principal {
    fn from(raw: RawPrincipal) -> Self {
        let mut attributes = raw.attributes;
        let role = match raw.role {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => match value.as_str().map(str::parse::<Role>) {
                Some(Ok(role)) => Some(role),
                _ => {
                    attributes.insert("role".to_string(), value);
                    None
                }
            },
        };
        Self {
            id: raw.id,
            name: raw.name,
            role,
            attributes,
        }
    }
}

impl Principal {
    /// Builds a principal with no extra attributes.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: Option<Role>,
    ) -> Self {
        Self {
            id: PrincipalId::new(id),
            name: name.into(),
            role,
            attributes: serde_json::Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExpiresAt
// ---------------------------------------------------------------------------

/// The instant the current access credential stops being valid,
/// in milliseconds since the Unix epoch.
///
/// Serialized as a bare number: `ExpiresAt(1700000000000)` ↔ `1700000000000`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ExpiresAt(i64);

impl ExpiresAt {
    pub fn from_millis(epoch_ms: i64) -> Self {
        Self(epoch_ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Signed distance from `now_ms` to the expiry. Negative once expired.
    pub fn millis_until(&self, now_ms: i64) -> i64 {
        self.0.saturating_sub(now_ms)
    }
}

impl fmt::Display for ExpiresAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Login form contents.
///
/// `Debug` is written by hand so a password never ends up in a log line.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// `POST /login` → `{ "user": {...}, "expiresAt": 1700000000000 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(alias = "user", alias = "staff", alias = "admin")]
    pub principal: Principal,
    pub expires_at: ExpiresAt,
}

/// `GET /status` → `{ "isAuthenticated": true, "user": {...}, "expiresAt": ... }`
///
/// A missing `isAuthenticated` reads as `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub is_authenticated: bool,

    #[serde(
        default,
        alias = "user",
        alias = "staff",
        alias = "admin",
        skip_serializing_if = "Option::is_none"
    )]
    pub principal: Option<Principal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<ExpiresAt>,
}

impl StatusResponse {
    /// The principal, but only if the backend also says the session is live.
    pub fn authenticated_principal(&self) -> Option<&Principal> {
        if self.is_authenticated {
            self.principal.as_ref()
        } else {
            None
        }
    }
}

/// `POST /refresh` → `{ "expiresAt": ..., "user": {...}? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub expires_at: ExpiresAt,

    #[serde(
        default,
        alias = "user",
        alias = "staff",
        alias = "admin",
        skip_serializing_if = "Option::is_none"
    )]
    pub principal: Option<Principal>,
}

// =========================================================================
// Tests
// =========================================================================
