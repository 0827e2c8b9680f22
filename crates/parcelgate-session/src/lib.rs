//! Session lifecycle for the parcelgate portals.
//!
//! One state machine serves all three portals (customer, staff, admin);
//! a [`RoleProfile`] supplies what differs between them. The lifecycle:
//!
//! 1. **Bootstrap** — on start, ask the backend who the cookie belongs to,
//!    with one silent refresh if the answer is "nobody".
//! 2. **Inactivity watchdog** — log out after a fixed window without user
//!    activity ([`ActivityKind`] events reset it).
//! 3. **Silent refresh** — a chain of one-shot timers, each computed from
//!    the expiry the previous refresh returned.
//! 4. **Logout** — idempotent teardown: timers, backend call, store,
//!    notification, redirect to the login route.
//!
//! # How it fits in the stack
//!
//! ```text
//! Portal facade (above)   ← one SessionHandle per role
//!     ↕
//! Session layer (this crate)  ← actor task owning the store and both timers
//!     ↕
//! Transport (below)       ← AuthApi: login / status / refresh / logout
//! ```
//!
//! Each session runs as its own Tokio task. Callers talk to it through a
//! cloneable [`SessionHandle`]; reads go through a `watch` channel and
//! never wait on the task.

mod activity;
mod bootstrap;
mod call;
mod config;
mod error;
mod manager;
mod refresh;
mod shell;
mod store;
mod watchdog;

pub use activity::{ActivityKind, ActivityMonitor, ActivitySink, NoopMonitor};
pub use config::{RoleProfile, SessionConfig, default_login_route};
pub use error::SessionError;
pub use manager::{SessionHandle, SessionManager, TimerReport};
pub use refresh::{RefreshPlan, RefreshScheduler};
pub use shell::{
    ChannelShell, LogoutReason, Navigation, Notification, NotificationLevel,
    Shell, ShellEvent,
};
pub use store::Session;
pub use watchdog::InactivityWatchdog;
