//! The session actor and its handle.
//!
//! Each role's session runs in its own Tokio task. The task owns the
//! store, both timers and the activity monitor, so every state change is
//! serialized through one loop and no locks are needed:
//!
//! ```text
//!                    ┌──────────── select! ────────────┐
//!  SessionHandle ──→ │ commands   (login, logout, ...) │
//!  ActivitySink  ──→ │ commands   (activity)           │
//!  spawned calls ──→ │ jobs       (refresh, recheck)   │ ──→ watch<Session>
//!                    │ watchdog   (inactivity)         │ ──→ Shell
//!                    │ refresh    (deadline)           │
//!                    └─────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! spawn ──→ bootstrap ──┬──→ [Authenticated] ──→ logout ──→ [LoggedOut]
//!                       │         ▲   │                         │
//!                       │         │   └─ refresh chain          │
//!                       └──→ [LoggedOut] ◄─────── login ────────┘
//! ```
//!
//! Refresh and recheck calls run in spawned tasks and report back on the
//! jobs channel, tagged with the epoch they started in. The epoch moves on
//! every login and logout, so a result that arrives after its session
//! ended is dropped instead of acting on the new one.

use std::sync::Arc;
use std::time::Duration;

use parcelgate_protocol::{
    Credentials, ExpiresAt, Principal, RefreshResponse, Role, StatusResponse,
};
use parcelgate_timer::SessionClock;
use parcelgate_transport::{ApiError, AuthApi};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::activity::{ActivityKind, ActivityMonitor, ActivitySink, NoopMonitor};
use crate::bootstrap::{BootstrapOutcome, bootstrap};
use crate::call::bounded;
use crate::refresh::{RefreshPlan, RefreshScheduler};
use crate::shell::{LogoutReason, Navigation, Notification, Shell};
use crate::store::{Session, SessionStore};
use crate::watchdog::InactivityWatchdog;
use crate::{RoleProfile, SessionError};

/// Default capacity of a session's command channel.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Commands sent to a session actor through its channel.
pub(crate) enum Command {
    Login {
        credentials: Credentials,
        reply: oneshot::Sender<Result<Principal, SessionError>>,
    },
    Logout {
        reply: oneshot::Sender<()>,
    },
    Activity(ActivityKind),
    Timers {
        reply: oneshot::Sender<TimerReport>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Results of backend calls the actor spawned instead of awaiting.
enum JobOutcome {
    Refresh {
        epoch: u64,
        result: Result<RefreshResponse, ApiError>,
    },
    Recheck {
        epoch: u64,
        result: Result<StatusResponse, ApiError>,
    },
}

/// Pending deadlines of a session, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerReport {
    /// Time left before an inactivity logout.
    pub inactivity: Option<Duration>,
    /// Time left before the next refresh (or refresh retry).
    pub refresh: Option<Duration>,
    /// A refresh call has been sent and not answered yet.
    pub refresh_in_flight: bool,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle to a running session. Cheap to clone.
///
/// The session stops when [`shutdown`](Self::shutdown) is called or the
/// last handle is dropped; neither contacts the backend.
#[derive(Clone)]
pub struct SessionHandle {
    role: Role,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<Session>,
}

impl SessionHandle {
    pub fn role(&self) -> Role {
        self.role
    }

    /// The current session value.
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// A receiver that is woken on every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.clone()
    }

    /// Waits for the startup check to finish and returns the session.
    pub async fn ready(&self) -> Session {
        let mut rx = self.state.clone();
        let settled = rx.wait_for(|s| !s.is_loading()).await.map(|s| s.clone());
        match settled {
            Ok(session) => session,
            // Actor gone; whatever it last published is final.
            Err(_) => rx.borrow().clone(),
        }
    }

    /// Signs in. On success the session is live, the watchdog and the
    /// refresh chain are running, and the principal is returned.
    ///
    /// # Errors
    ///
    /// [`SessionError::AuthFailed`] if the backend rejects the credentials,
    /// [`SessionError::Api`] for any other backend failure. The session is
    /// left untouched on failure.
    pub async fn login(&self, credentials: Credentials) -> Result<Principal, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Login { credentials, reply }).await?;
        rx.await.map_err(|_| SessionError::Unavailable(self.role))?
    }

    /// Logs out and navigates to the login route. Safe to call when no
    /// one is signed in (only the navigation happens).
    pub async fn logout(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Logout { reply }).await?;
        rx.await.map_err(|_| SessionError::Unavailable(self.role))
    }

    /// Reports one user-activity event. Never blocks; returns `false` if
    /// the event was dropped.
    pub fn record_activity(&self, kind: ActivityKind) -> bool {
        self.commands.try_send(Command::Activity(kind)).is_ok()
    }

    /// A weak sink that front ends can keep for reporting activity.
    pub fn activity_sink(&self) -> ActivitySink {
        ActivitySink::new(self.commands.downgrade())
    }

    pub async fn timers(&self) -> Result<TimerReport, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Timers { reply }).await?;
        rx.await.map_err(|_| SessionError::Unavailable(self.role))
    }

    /// Stops the session: cancels both timers and detaches the activity
    /// monitor. Does not log out on the backend and does not navigate.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown { reply }).await?;
        rx.await.map_err(|_| SessionError::Unavailable(self.role))
    }

    async fn send(&self, cmd: Command) -> Result<(), SessionError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| SessionError::Unavailable(self.role))
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("role", &self.role)
            .field("session", &*self.state.borrow())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Builds and spawns a session actor.
///
/// ```ignore
/// let handle = SessionManager::new(RoleProfile::new(Role::Staff), api, shell)
///     .monitor(my_input_monitor)
///     .spawn();
/// let session = handle.ready().await;
/// ```
pub struct SessionManager<A: AuthApi> {
    profile: RoleProfile,
    api: Arc<A>,
    shell: Arc<dyn Shell>,
    monitor: Box<dyn ActivityMonitor>,
    clock: Option<SessionClock>,
    channel_size: usize,
}

impl<A: AuthApi> SessionManager<A> {
    pub fn new(profile: RoleProfile, api: Arc<A>, shell: impl Shell) -> Self {
        Self {
            profile,
            api,
            shell: Arc::new(shell),
            monitor: Box::new(NoopMonitor),
            clock: None,
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }

    /// Input source attached while a session is live.
    pub fn monitor(mut self, monitor: impl ActivityMonitor) -> Self {
        self.monitor = Box::new(monitor);
        self
    }

    /// Clock used to turn expiries into delays. Defaults to the system
    /// clock, read when the session is spawned.
    pub fn clock(mut self, clock: SessionClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn channel_size(mut self, size: usize) -> Self {
        self.channel_size = size.max(1);
        self
    }

    /// Spawns the session task and starts the startup check.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> SessionHandle {
        let config = self.profile.config.clone().validated();
        let role = self.profile.role;

        let (tx, rx) = mpsc::channel(self.channel_size);
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (store, state) = SessionStore::new();

        let actor = SessionActor {
            role,
            login_route: self.profile.login_route,
            request_timeout: config.request_timeout(),
            recheck_interval: config.activity_recheck(),
            api: self.api,
            shell: self.shell,
            monitor: self.monitor,
            monitor_attached: false,
            clock: self.clock.unwrap_or_else(SessionClock::system),
            store,
            watchdog: InactivityWatchdog::new(config.inactivity_timeout()),
            refresh: RefreshScheduler::new(
                config.refresh_buffer(),
                config.refresh_backoff(),
                config.refresh_max_retries,
            ),
            epoch: 0,
            recheck_in_flight: None,
            last_recheck: None,
            weak_commands: tx.downgrade(),
            commands: rx,
            jobs_tx,
            jobs_rx,
        };

        tokio::spawn(actor.run());

        SessionHandle {
            role,
            commands: tx,
            state,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionActor
// ---------------------------------------------------------------------------

struct SessionActor<A: AuthApi> {
    role: Role,
    login_route: String,
    request_timeout: Duration,
    recheck_interval: Option<Duration>,
    api: Arc<A>,
    shell: Arc<dyn Shell>,
    monitor: Box<dyn ActivityMonitor>,
    monitor_attached: bool,
    clock: SessionClock,
    store: SessionStore,
    watchdog: InactivityWatchdog,
    refresh: RefreshScheduler,
    /// Bumped whenever a session starts or ends.
    epoch: u64,
    /// Epoch of the recheck currently running, if any.
    recheck_in_flight: Option<u64>,
    last_recheck: Option<Instant>,
    weak_commands: mpsc::WeakSender<Command>,
    commands: mpsc::Receiver<Command>,
    jobs_tx: mpsc::UnboundedSender<JobOutcome>,
    jobs_rx: mpsc::UnboundedReceiver<JobOutcome>,
}

impl<A: AuthApi> SessionActor<A> {
    async fn run(mut self) {
        tracing::info!(role = %self.role, "session actor started");

        self.bootstrap().await;

        let shutdown_reply = loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => break Some(reply),
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break None,
                },
                Some(outcome) = self.jobs_rx.recv() => {
                    self.handle_outcome(outcome).await;
                }
                _ = self.watchdog.wait() => {
                    tracing::info!(role = %self.role, "inactivity window elapsed");
                    self.logout(LogoutReason::Inactivity).await;
                }
                _ = self.refresh.wait() => {
                    self.start_refresh();
                }
            }
        };

        self.stop_timers();
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
        tracing::info!(role = %self.role, "session actor stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Login { credentials, reply } => {
                let result = self.login(credentials).await;
                let _ = reply.send(result);
            }
            Command::Logout { reply } => {
                self.logout(LogoutReason::Manual).await;
                let _ = reply.send(());
            }
            Command::Activity(kind) => self.on_activity(kind),
            Command::Timers { reply } => {
                let _ = reply.send(TimerReport {
                    inactivity: self.watchdog.remaining(),
                    refresh: self.refresh.remaining(),
                    refresh_in_flight: self.refresh.is_in_flight(),
                });
            }
            // Handled by the loop.
            Command::Shutdown { .. } => {}
        }
    }

    // -- Startup and sign-in ------------------------------------------------

    async fn bootstrap(&mut self) {
        self.store.set_loading(true);
        match bootstrap(self.api.as_ref(), self.role, self.request_timeout).await {
            BootstrapOutcome::Established {
                principal,
                expires_at,
            } => self.establish(principal, expires_at),
            BootstrapOutcome::LoggedOut => {
                tracing::info!(role = %self.role, "no active session");
                self.store.clear();
            }
        }
    }

    async fn login(&mut self, credentials: Credentials) -> Result<Principal, SessionError> {
        tracing::debug!(role = %self.role, username = %credentials.username, "login requested");
        match bounded(self.request_timeout, self.api.login(&credentials)).await {
            Ok(response) => {
                let principal = response.principal.clone();
                self.establish(response.principal, Some(response.expires_at));
                Ok(principal)
            }
            Err(err) if err.is_auth() => {
                tracing::info!(role = %self.role, error = %err, "login rejected");
                Err(SessionError::AuthFailed(err.to_string()))
            }
            Err(err) => {
                tracing::warn!(role = %self.role, error = %err, "login failed");
                Err(SessionError::Api(err))
            }
        }
    }

    /// Makes `principal` the live session and (re)starts every timer.
    fn establish(&mut self, principal: Principal, expires_at: Option<ExpiresAt>) {
        self.epoch += 1;
        self.refresh.stop();
        self.recheck_in_flight = None;
        self.last_recheck = Some(Instant::now());

        tracing::info!(
            role = %self.role,
            principal = %principal.id,
            epoch = self.epoch,
            "session established"
        );
        self.store.establish(principal);
        self.watchdog.start();
        self.attach_monitor();

        match expires_at {
            Some(expires_at) => self.schedule_refresh(expires_at),
            None => tracing::warn!(
                role = %self.role,
                "backend sent no expiry, silent refresh disabled for this session"
            ),
        }
    }

    // -- Refresh chain ------------------------------------------------------

    fn schedule_refresh(&mut self, expires_at: ExpiresAt) {
        match self.refresh.schedule(expires_at, self.clock.now_millis()) {
            RefreshPlan::Armed(delay) => {
                tracing::debug!(
                    role = %self.role,
                    %expires_at,
                    in_ms = delay.as_millis() as u64,
                    "refresh scheduled"
                );
            }
            RefreshPlan::DueNow => {
                tracing::debug!(role = %self.role, %expires_at, "expiry inside buffer, refreshing now");
                self.start_refresh();
            }
        }
    }

    fn start_refresh(&mut self) {
        if !self.store.is_authenticated() {
            return;
        }
        if !self.refresh.begin() {
            tracing::debug!(role = %self.role, "refresh already in flight");
            return;
        }

        let api = Arc::clone(&self.api);
        let jobs = self.jobs_tx.clone();
        let epoch = self.epoch;
        let limit = self.request_timeout;
        tokio::spawn(async move {
            let result = bounded(limit, api.refresh()).await;
            let _ = jobs.send(JobOutcome::Refresh { epoch, result });
        });
    }

    async fn on_refresh_result(&mut self, result: Result<RefreshResponse, ApiError>) {
        match result {
            Ok(refreshed) => {
                if let Some(principal) = refreshed.principal {
                    self.store.replace_principal(principal);
                }
                let expires_at = refreshed.expires_at;
                match self.refresh.schedule(expires_at, self.clock.now_millis()) {
                    RefreshPlan::Armed(delay) => {
                        self.refresh.succeeded();
                        tracing::info!(
                            role = %self.role,
                            %expires_at,
                            next_in_ms = delay.as_millis() as u64,
                            "session refreshed"
                        );
                    }
                    RefreshPlan::DueNow => {
                        // Refreshing again at once would spin; back off.
                        tracing::warn!(role = %self.role, %expires_at, "refresh returned an expiry that is already due");
                        self.retry_or_expire().await;
                    }
                }
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(role = %self.role, error = %err, "refresh failed");
                self.retry_or_expire().await;
            }
            Err(err) => {
                tracing::warn!(role = %self.role, error = %err, "refresh rejected");
                self.logout(LogoutReason::SessionExpired).await;
            }
        }
    }

    async fn retry_or_expire(&mut self) {
        match self.refresh.retry_after_failure() {
            Some(delay) => tracing::info!(
                role = %self.role,
                attempt = self.refresh.retries(),
                retry_in_ms = delay.as_millis() as u64,
                "refresh retry scheduled"
            ),
            None => {
                tracing::warn!(role = %self.role, "refresh retries exhausted");
                self.logout(LogoutReason::SessionExpired).await;
            }
        }
    }

    // -- Activity -----------------------------------------------------------

    fn on_activity(&mut self, kind: ActivityKind) {
        if !self.watchdog.reset() {
            tracing::trace!(role = %self.role, %kind, "activity ignored, no live session");
            return;
        }
        tracing::trace!(role = %self.role, %kind, "activity");
        self.maybe_recheck();
    }

    /// Re-validates the session with the backend, at most once per
    /// `recheck_interval` and never twice concurrently.
    fn maybe_recheck(&mut self) {
        let Some(interval) = self.recheck_interval else {
            return;
        };
        if self.recheck_in_flight.is_some() {
            return;
        }
        let now = Instant::now();
        if self
            .last_recheck
            .is_some_and(|last| now.duration_since(last) < interval)
        {
            return;
        }

        self.last_recheck = Some(now);
        self.recheck_in_flight = Some(self.epoch);

        let api = Arc::clone(&self.api);
        let jobs = self.jobs_tx.clone();
        let epoch = self.epoch;
        let limit = self.request_timeout;
        tokio::spawn(async move {
            let result = bounded(limit, api.status()).await;
            let _ = jobs.send(JobOutcome::Recheck { epoch, result });
        });
    }

    async fn on_recheck_result(&mut self, result: Result<StatusResponse, ApiError>) {
        match result {
            Ok(status) => {
                let Some(principal) = status.authenticated_principal().cloned() else {
                    tracing::info!(role = %self.role, "backend reports the session has ended");
                    self.logout(LogoutReason::SessionExpired).await;
                    return;
                };
                self.store.replace_principal(principal);
                // A status answered after a refresh can carry the older
                // expiry; the chain only ever moves forward.
                if let Some(expires_at) = status.expires_at {
                    let later = self.refresh.expires_at().is_none_or(|cur| expires_at > cur);
                    if later && !self.refresh.is_in_flight() {
                        self.schedule_refresh(expires_at);
                    }
                }
            }
            Err(err) if err.is_auth() => {
                tracing::info!(role = %self.role, error = %err, "recheck rejected");
                self.logout(LogoutReason::SessionExpired).await;
            }
            Err(err) => {
                tracing::debug!(role = %self.role, error = %err, "recheck failed, ignoring");
            }
        }
    }

    async fn handle_outcome(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Refresh { epoch, result } => {
                if epoch != self.epoch {
                    tracing::debug!(role = %self.role, epoch, "dropping refresh result of an ended session");
                    return;
                }
                self.on_refresh_result(result).await;
            }
            JobOutcome::Recheck { epoch, result } => {
                if self.recheck_in_flight == Some(epoch) {
                    self.recheck_in_flight = None;
                }
                if epoch != self.epoch {
                    tracing::debug!(role = %self.role, epoch, "dropping recheck result of an ended session");
                    return;
                }
                self.on_recheck_result(result).await;
            }
        }
    }

    // -- Teardown -----------------------------------------------------------

    /// Ends the session. Safe to call any number of times: when nobody is
    /// signed in, only the navigation happens.
    async fn logout(&mut self, reason: LogoutReason) {
        let was_active = self.store.is_authenticated();
        self.stop_timers();

        if was_active {
            if let Err(err) = bounded(self.request_timeout, self.api.logout()).await {
                tracing::warn!(
                    role = %self.role,
                    error = %err,
                    "backend logout failed, clearing local session anyway"
                );
            }
        }

        self.store.clear();

        if was_active {
            tracing::info!(role = %self.role, %reason, "logged out");
            self.shell.notify(Notification::logged_out(self.role, reason));
        } else {
            tracing::debug!(role = %self.role, %reason, "logout with no live session");
        }
        self.shell.navigate(Navigation::replace(self.login_route.clone()));
    }

    /// Cancels both timers, ends the epoch and detaches the monitor.
    /// Leaves the store alone.
    fn stop_timers(&mut self) {
        self.epoch += 1;
        self.watchdog.stop();
        self.refresh.stop();
        self.recheck_in_flight = None;
        self.detach_monitor();
    }

    fn attach_monitor(&mut self) {
        if self.monitor_attached {
            return;
        }
        let sink = ActivitySink::new(self.weak_commands.clone());
        self.monitor.attach(&ActivityKind::ALL, sink);
        self.monitor_attached = true;
    }

    fn detach_monitor(&mut self) {
        if !self.monitor_attached {
            return;
        }
        self.monitor.detach();
        self.monitor_attached = false;
    }
}
