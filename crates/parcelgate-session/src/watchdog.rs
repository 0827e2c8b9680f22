//! Inactivity watchdog.

use std::time::Duration;

use parcelgate_timer::{Fired, OneShotTimer};

/// Logs the user out after a fixed window without activity.
///
/// The watchdog is only live between [`start`](Self::start) and
/// [`stop`](Self::stop) (or its own firing). Outside that span,
/// [`reset`](Self::reset) is a no-op, so a stray activity event arriving
/// after logout can never re-arm it.
pub struct InactivityWatchdog {
    timer: OneShotTimer,
    timeout: Duration,
    active: bool,
}

impl InactivityWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timer: OneShotTimer::new("inactivity"),
            timeout,
            active: false,
        }
    }

    /// Makes the watchdog live and arms a full window.
    pub fn start(&mut self) {
        self.active = true;
        self.timer.arm(self.timeout);
    }

    /// Restarts the window. Returns `false` (and does nothing) when the
    /// watchdog isn't live.
    pub fn reset(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.timer.arm(self.timeout);
        true
    }

    /// Cancels the window and makes the watchdog inert. Idempotent.
    pub fn stop(&mut self) {
        self.active = false;
        self.timer.cancel();
    }

    /// Resolves when the window elapses; pends forever while not live.
    /// After firing the watchdog is inert until started again.
    pub async fn wait(&mut self) -> Fired {
        let fired = self.timer.wait().await;
        self.active = false;
        fired
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.timer.remaining()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
