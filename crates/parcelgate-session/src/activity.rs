//! User-activity detection.
//!
//! The embedding front end owns the actual input sources (DOM listeners,
//! terminal events...). It plugs them in through an [`ActivityMonitor`],
//! which the session attaches while someone is signed in and detaches on
//! logout. Events reach the session through an [`ActivitySink`].

use std::fmt;

use tokio::sync::mpsc;

use crate::manager::Command;

/// The kinds of user input that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerMove,
    KeyPress,
    Scroll,
    Click,
    TouchStart,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::PointerMove,
        ActivityKind::KeyPress,
        ActivityKind::Scroll,
        ActivityKind::Click,
        ActivityKind::TouchStart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointerMove => "pointermove",
            Self::KeyPress => "keypress",
            Self::Scroll => "scroll",
            Self::Click => "click",
            Self::TouchStart => "touchstart",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivers activity events to a session.
///
/// Holds only a weak reference to the session's command channel, so a
/// sink left behind by a front end never keeps a session alive.
#[derive(Clone)]
pub struct ActivitySink {
    commands: mpsc::WeakSender<Command>,
}

impl ActivitySink {
    pub(crate) fn new(commands: mpsc::WeakSender<Command>) -> Self {
        Self { commands }
    }

    /// Reports one activity event. Never blocks.
    ///
    /// Returns `false` if the event was dropped: the session is gone, or
    /// its queue is full (in which case plenty of activity is already
    /// queued and the watchdog will be reset anyway).
    pub fn record(&self, kind: ActivityKind) -> bool {
        match self.commands.upgrade() {
            Some(tx) => tx.try_send(Command::Activity(kind)).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for ActivitySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivitySink").finish_non_exhaustive()
    }
}

/// An input source the session can subscribe to.
///
/// `attach` and `detach` always come in pairs: the session attaches once
/// when a session is established and detaches once when it ends, never
/// attaching twice in a row.
pub trait ActivityMonitor: Send + 'static {
    /// Starts forwarding the given kinds of events to `sink`.
    fn attach(&mut self, kinds: &[ActivityKind], sink: ActivitySink);

    /// Stops forwarding and releases the sink.
    fn detach(&mut self);
}

/// A monitor with no input source. Activity then only arrives through
/// [`SessionHandle::record_activity`](crate::SessionHandle::record_activity).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl ActivityMonitor for NoopMonitor {
    fn attach(&mut self, _kinds: &[ActivityKind], _sink: ActivitySink) {}

    fn detach(&mut self) {}
}
