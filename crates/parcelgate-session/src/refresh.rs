//! Silent-refresh scheduling.
//!
//! The refresh chain is a sequence of one-shot deadlines, each computed
//! from the expiry the previous refresh returned:
//!
//! ```text
//! delay = expires_at - now - buffer
//! ```
//!
//! The scheduler owns the deadline, the in-flight flag and the retry
//! counter. It never talks to the backend: the session actor asks it when
//! to refresh and tells it how the attempt went.

use std::time::Duration;

use parcelgate_protocol::ExpiresAt;
use parcelgate_timer::{Backoff, Fired, OneShotTimer};

/// What [`RefreshScheduler::schedule`] decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
    /// A deadline is pending, this far out.
    Armed(Duration),
    /// The expiry is already inside the buffer; refresh right away.
    DueNow,
}

pub struct RefreshScheduler {
    timer: OneShotTimer,
    buffer: Duration,
    backoff: Backoff,
    max_retries: u32,
    /// Consecutive transient failures of the current attempt.
    retries: u32,
    in_flight: bool,
    expires_at: Option<ExpiresAt>,
}

impl RefreshScheduler {
    pub fn new(buffer: Duration, backoff: Backoff, max_retries: u32) -> Self {
        Self {
            timer: OneShotTimer::new("refresh"),
            buffer,
            backoff,
            max_retries,
            retries: 0,
            in_flight: false,
            expires_at: None,
        }
    }

    /// Plans the next refresh for a credential expiring at `expires_at`,
    /// replacing any pending deadline.
    pub fn schedule(&mut self, expires_at: ExpiresAt, now_ms: i64) -> RefreshPlan {
        self.expires_at = Some(expires_at);
        let buffer_ms = i64::try_from(self.buffer.as_millis()).unwrap_or(i64::MAX);
        let delay_ms = expires_at.millis_until(now_ms).saturating_sub(buffer_ms);

        if delay_ms <= 0 {
            self.timer.cancel();
            return RefreshPlan::DueNow;
        }
        let delay = Duration::from_millis(delay_ms as u64);
        self.timer.arm(delay);
        RefreshPlan::Armed(delay)
    }

    /// Claims the single in-flight slot. Returns `false` if a refresh is
    /// already running, in which case the caller must not start another.
    pub fn begin(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.timer.cancel();
        self.in_flight = true;
        true
    }

    /// The attempt succeeded. The caller schedules the next link.
    pub fn succeeded(&mut self) {
        self.in_flight = false;
        self.retries = 0;
    }

    /// The attempt failed transiently. Arms a retry and returns its delay,
    /// or `None` once the retry budget is spent.
    pub fn retry_after_failure(&mut self) -> Option<Duration> {
        self.in_flight = false;
        if self.retries >= self.max_retries {
            return None;
        }
        let delay = self.backoff.delay(self.retries);
        self.retries += 1;
        self.timer.arm(delay);
        Some(delay)
    }

    /// Ends the chain: no deadline, nothing in flight. Idempotent.
    pub fn stop(&mut self) {
        self.timer.cancel();
        self.in_flight = false;
        self.retries = 0;
        self.expires_at = None;
    }

    /// Resolves when the pending deadline is reached; pends forever when
    /// none is set.
    pub async fn wait(&mut self) -> Fired {
        self.timer.wait().await
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.timer.remaining()
    }

    /// Expiry of the credential the chain is currently tracking.
    pub fn expires_at(&self) -> Option<ExpiresAt> {
        self.expires_at
    }
}
