//! One-shot deadline timers for the parcelgate session lifecycle.
//!
//! A session owns two timers: the inactivity watchdog and the token
//! refresh scheduler. Both follow the same rule: **at most one pending
//! deadline**, and arming again replaces the previous one. [`OneShotTimer`]
//! makes that rule structural: it stores a single `Option<Instant>`, so
//! there is nothing to leak and nothing to fire twice.
//!
//! # Disarmed timers pend forever
//!
//! When no deadline is set, [`OneShotTimer::wait`] never resolves. That is
//! what lets the timer sit in a `tokio::select!` loop unconditionally:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* may arm or cancel */ }
//!         _ = watchdog.wait() => { /* deadline reached */ }
//!     }
//! }
//! ```
//!
//! All deadlines use `tokio::time::Instant`, so tests drive them with
//! `#[tokio::test(start_paused = true)]` instead of real sleeps.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// OneShotTimer
// ---------------------------------------------------------------------------

/// Information about a deadline that was reached, returned by
/// [`OneShotTimer::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    /// Generation of the arm call that produced this deadline.
    pub generation: u64,
    /// How long after the deadline the waiter actually woke up.
    pub late_by: Duration,
}

/// A timer with at most one pending deadline.
pub struct OneShotTimer {
    /// Name used in log lines ("inactivity", "refresh").
    label: &'static str,
    deadline: Option<Instant>,
    /// Incremented on every arm, so callers can tell deadlines apart.
    generation: u64,
}

impl OneShotTimer {
    /// Creates a disarmed timer.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            deadline: None,
            generation: 0,
        }
    }

    /// Arms the timer to fire `delay` from now, replacing any pending
    /// deadline. Returns the new generation.
    pub fn arm(&mut self, delay: Duration) -> u64 {
        let deadline = Instant::now() + delay;
        if self.deadline.is_some() {
            trace!(timer = self.label, "replacing pending deadline");
        }
        self.generation += 1;
        self.deadline = Some(deadline);
        debug!(
            timer = self.label,
            generation = self.generation,
            in_ms = delay.as_millis() as u64,
            "timer armed"
        );
        self.generation
    }

    /// Drops the pending deadline, if any. Returns whether one was pending.
    ///
    /// Safe to call on a disarmed timer (idempotent).
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.deadline.take().is_some();
        if was_armed {
            debug!(timer = self.label, generation = self.generation, "timer cancelled");
        }
        was_armed
    }

    /// Waits until the pending deadline is reached, then disarms.
    ///
    /// Pends forever while disarmed. Dropping the future before it
    /// completes leaves the deadline in place, so the method is safe to
    /// use as a `select!` branch.
    pub async fn wait(&mut self) -> Fired {
        let Some(deadline) = self.deadline else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(deadline).await;

        self.deadline = None;
        let late_by = Instant::now().saturating_duration_since(deadline);
        trace!(timer = self.label, generation = self.generation, "timer fired");

        Fired {
            generation: self.generation,
            late_by,
        }
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the pending deadline (zero if it already passed).
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Number of arm calls so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// ---------------------------------------------------------------------------
// SessionClock
// ---------------------------------------------------------------------------

/// Wall-clock milliseconds, the time base of credential expiries.
///
/// [`system`](Self::system) reads the system time on every call, so a
/// refresh delay computed after the host slept or the clock was adjusted
/// starts from the real current time. [`starting_at`](Self::starting_at)
/// instead anchors a fixed epoch time to `tokio::time::Instant`, which
/// lets paused-time tests move both sides of `expiry - now` together.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    source: ClockSource,
}

#[derive(Debug, Clone, Copy)]
enum ClockSource {
    System,
    Anchored { epoch_ms: i64, at: Instant },
}

impl SessionClock {
    pub fn system() -> Self {
        Self {
            source: ClockSource::System,
        }
    }

    /// Anchors to a fixed epoch time, advanced by tokio's clock.
    pub fn starting_at(epoch_ms: i64) -> Self {
        Self {
            source: ClockSource::Anchored {
                epoch_ms,
                at: Instant::now(),
            },
        }
    }

    /// Current time in epoch milliseconds.
    pub fn now_millis(&self) -> i64 {
        match self.source {
            ClockSource::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or_default(),
            ClockSource::Anchored { epoch_ms, at } => {
                epoch_ms.saturating_add(at.elapsed().as_millis() as i64)
            }
        }
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::system()
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Exponential backoff with random jitter.
///
/// `delay(n) = min(base × 2ⁿ, max) + jitter`, where the jitter is drawn
/// uniformly from `0..=delay × jitter_ratio`. Jitter keeps the portals of a
/// whole office from retrying against a recovering backend in lockstep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    /// Fraction of the delay added as random jitter (0.0–1.0).
    pub jitter_ratio: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            jitter_ratio: 0.2,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        let raw = self.base.saturating_mul(factor).min(self.max);

        let ratio = self.jitter_ratio.clamp(0.0, 1.0);
        let jitter_cap_us = (raw.as_micros() as f64 * ratio) as u64;
        if jitter_cap_us == 0 {
            return raw;
        }
        let jitter_us = rand::rng().random_range(0..=jitter_cap_us);
        raw + Duration::from_micros(jitter_us)
    }
}
