//! The session's outward effects: user notifications and navigation.
//!
//! The session never renders anything itself. When it logs a user out it
//! tells the [`Shell`] what to show and where to go, and the embedding
//! application decides how.

use std::fmt;

use parcelgate_protocol::Role;
use tokio::sync::mpsc;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogoutReason {
    /// The user asked to log out.
    Manual,
    /// The inactivity window elapsed without user activity.
    Inactivity,
    /// The backend no longer accepts the session (refresh or recheck
    /// rejected, or refresh retries exhausted).
    SessionExpired,
}

impl LogoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Inactivity => "inactivity",
            Self::SessionExpired => "session_expired",
        }
    }

    /// Text shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Manual => "You have been logged out.",
            Self::Inactivity => {
                "You were logged out due to inactivity. Please log in again."
            }
            Self::SessionExpired => "Your session has expired. Please log in again.",
        }
    }

    pub fn level(&self) -> NotificationLevel {
        match self {
            Self::Manual => NotificationLevel::Info,
            Self::Inactivity | Self::SessionExpired => NotificationLevel::Warning,
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
}

/// A user-visible message (a toast, in a browser).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub role: Role,
    pub reason: LogoutReason,
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn logged_out(role: Role, reason: LogoutReason) -> Self {
        Self {
            role,
            reason,
            level: reason.level(),
            message: reason.message().to_string(),
        }
    }
}

/// A route change requested by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub route: String,
    /// Replace the current history entry instead of pushing one, so
    /// "back" cannot return to a page of the ended session.
    pub replace: bool,
}

impl Navigation {
    pub fn replace(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            replace: true,
        }
    }
}

/// Sink for the session's outward effects.
///
/// Called from inside the session task, so implementations should hand
/// the effect off and return rather than block.
pub trait Shell: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
    fn navigate(&self, navigation: Navigation);
}

/// An effect emitted through a [`ChannelShell`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    Notify(Notification),
    Navigate(Navigation),
}

/// A [`Shell`] that forwards every effect into an unbounded channel.
///
/// Useful for tests (assert on the exact sequence of effects) and for
/// front ends that drain effects on their own event loop.
#[derive(Debug, Clone)]
pub struct ChannelShell {
    tx: mpsc::UnboundedSender<ShellEvent>,
}

impl ChannelShell {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ShellEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Shell for ChannelShell {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is displaying effects any more.
        let _ = self.tx.send(ShellEvent::Notify(notification));
    }

    fn navigate(&self, navigation: Navigation) {
        let _ = self.tx.send(ShellEvent::Navigate(navigation));
    }
}
