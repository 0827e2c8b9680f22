//! The observable session value and the single writer that owns it.

use parcelgate_protocol::Principal;
use tokio::sync::watch;

/// What the rest of the portal may know about the current session.
///
/// Fields are private so the pairing holds by construction:
/// `is_authenticated()` is true exactly when `principal()` is `Some`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    principal: Option<Principal>,
    loading: bool,
}

impl Session {
    /// Startup state: nobody signed in, verification pending.
    pub(crate) fn loading() -> Self {
        Self {
            principal: None,
            loading: true,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// True while the startup check is still running. Views should hold
    /// off on redirecting to login until this clears.
    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

/// Owns the `watch::Sender` side of the session value.
///
/// Only the session actor holds one, so every write is serialized through
/// its loop. Each write replaces the whole value; watchers are only woken
/// when something actually changed.
pub(crate) struct SessionStore {
    tx: watch::Sender<Session>,
}

impl SessionStore {
    pub(crate) fn new() -> (Self, watch::Receiver<Session>) {
        let (tx, rx) = watch::channel(Session::loading());
        (Self { tx }, rx)
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    pub(crate) fn principal(&self) -> Option<Principal> {
        self.tx.borrow().principal.clone()
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        let principal = self.principal();
        self.publish(Session { principal, loading });
    }

    /// Signs `principal` in. Also ends loading.
    pub(crate) fn establish(&self, principal: Principal) {
        self.publish(Session {
            principal: Some(principal),
            loading: false,
        });
    }

    /// Swaps the principal of a live session (refresh or recheck returned
    /// a newer one). Ignored when nobody is signed in.
    pub(crate) fn replace_principal(&self, principal: Principal) {
        if !self.is_authenticated() {
            return;
        }
        self.publish(Session {
            principal: Some(principal),
            loading: false,
        });
    }

    /// Signs out. Also ends loading.
    pub(crate) fn clear(&self) {
        self.publish(Session {
            principal: None,
            loading: false,
        });
    }

    fn publish(&self, next: Session) {
        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
