//! Shared fixtures: a scripted auth backend, a recording activity monitor
//! and a harness that spawns a session against them.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parcelgate_protocol::{
    Credentials, ExpiresAt, LoginResponse, Principal, RefreshResponse, Role,
    StatusResponse,
};
use parcelgate_session::{
    ActivityKind, ActivityMonitor, ActivitySink, ChannelShell, RoleProfile,
    SessionConfig, SessionHandle, SessionManager, ShellEvent,
};
use parcelgate_timer::SessionClock;
use parcelgate_transport::{ApiError, AuthApi};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Wall-clock origin of every test, in epoch milliseconds.
pub const T0: i64 = 1_700_000_000_000;

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

pub fn millis(n: u64) -> Duration {
    Duration::from_millis(n)
}

// =========================================================================
// Response builders
// =========================================================================

pub fn principal(id: &str, name: &str) -> Principal {
    Principal::new(id, name, None)
}

pub fn alice() -> Principal {
    principal("u-1", "Alice")
}

pub fn authed(principal: Principal, expires_at: Option<i64>) -> StatusResponse {
    StatusResponse {
        is_authenticated: true,
        principal: Some(principal),
        expires_at: expires_at.map(ExpiresAt::from_millis),
    }
}

pub fn unauthed() -> StatusResponse {
    StatusResponse {
        is_authenticated: false,
        principal: None,
        expires_at: None,
    }
}

pub fn login_ok(principal: Principal, expires_at: i64) -> LoginResponse {
    LoginResponse {
        principal,
        expires_at: ExpiresAt::from_millis(expires_at),
    }
}

pub fn refresh_ok(expires_at: i64) -> RefreshResponse {
    RefreshResponse {
        expires_at: ExpiresAt::from_millis(expires_at),
        principal: None,
    }
}

pub fn creds() -> Credentials {
    Credentials::new("alice", "hunter2")
}

// =========================================================================
// MockApi
// =========================================================================

type Make<T> = Box<dyn FnOnce(i64) -> Result<T, ApiError> + Send>;
type Fallback<T> = Box<dyn Fn(i64) -> Result<T, ApiError> + Send>;

/// One scripted reply. `make` receives the wall clock (epoch ms) at the
/// moment of the call, so replies can say "expires ten seconds from now".
pub struct Step<T> {
    delay: Duration,
    make: Make<T>,
}

impl<T: Send + 'static> Step<T> {
    pub fn ok(value: T) -> Self {
        Self::with(move |_| Ok(value))
    }

    pub fn err(err: ApiError) -> Self {
        Self::with(move |_| Err(err))
    }

    pub fn with(make: impl FnOnce(i64) -> Result<T, ApiError> + Send + 'static) -> Self {
        Self {
            delay: Duration::ZERO,
            make: Box::new(make),
        }
    }

    /// The reply takes this long to arrive.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

struct Endpoint<T> {
    queue: VecDeque<Step<T>>,
    fallback: Fallback<T>,
}

impl<T> Endpoint<T> {
    fn new(fallback: impl Fn(i64) -> Result<T, ApiError> + Send + 'static) -> Mutex<Self> {
        Mutex::new(Self {
            queue: VecDeque::new(),
            fallback: Box::new(fallback),
        })
    }
}

/// A recorded backend call and when (since the mock was built) it started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: &'static str,
    pub at: Duration,
}

/// Auth backend that replays scripted steps, then falls back to a
/// per-endpoint default.
///
/// Defaults: nobody is signed in (status unauthenticated, refresh and
/// login 401) and logout succeeds.
pub struct MockApi {
    clock: SessionClock,
    start: Instant,
    calls: Mutex<Vec<Call>>,
    login: Mutex<Endpoint<LoginResponse>>,
    status: Mutex<Endpoint<StatusResponse>>,
    refresh: Mutex<Endpoint<RefreshResponse>>,
    logout: Mutex<Endpoint<()>>,
}

impl MockApi {
    pub fn new(clock: SessionClock) -> Arc<Self> {
        Arc::new(Self {
            clock,
            start: Instant::now(),
            calls: Mutex::new(Vec::new()),
            login: Endpoint::new(|_| Err(ApiError::Unauthorized)),
            status: Endpoint::new(|_| Ok(unauthed())),
            refresh: Endpoint::new(|_| Err(ApiError::Unauthorized)),
            logout: Endpoint::new(|_| Ok(())),
        })
    }

    pub fn clock(&self) -> SessionClock {
        self.clock
    }

    pub fn push_login(&self, step: Step<LoginResponse>) {
        self.login.lock().unwrap().queue.push_back(step);
    }

    pub fn push_status(&self, step: Step<StatusResponse>) {
        self.status.lock().unwrap().queue.push_back(step);
    }

    pub fn push_refresh(&self, step: Step<RefreshResponse>) {
        self.refresh.lock().unwrap().queue.push_back(step);
    }

    pub fn push_logout(&self, step: Step<()>) {
        self.logout.lock().unwrap().queue.push_back(step);
    }

    /// Every refresh after the scripted ones extends the session by `ttl`.
    pub fn refresh_extends_by(&self, ttl: Duration) {
        let ttl_ms = ttl.as_millis() as i64;
        self.refresh.lock().unwrap().fallback =
            Box::new(move |now| Ok(refresh_ok(now + ttl_ms)));
    }

    /// Every status call after the scripted ones returns `status`.
    pub fn status_always(&self, status: StatusResponse) {
        self.status.lock().unwrap().fallback = Box::new(move |_| Ok(status.clone()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.name).collect()
    }

    /// Start offsets of every call to `name`.
    pub fn calls_to(&self, name: &str) -> Vec<Duration> {
        self.calls()
            .into_iter()
            .filter(|c| c.name == name)
            .map(|c| c.at)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls_to(name).len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn next<T>(&self, name: &'static str, endpoint: &Mutex<Endpoint<T>>) -> (Duration, Result<T, ApiError>) {
        self.calls.lock().unwrap().push(Call {
            name,
            at: self.start.elapsed(),
        });
        let now = self.clock.now_millis();
        let mut endpoint = endpoint.lock().unwrap();
        match endpoint.queue.pop_front() {
            Some(step) => (step.delay, (step.make)(now)),
            None => (Duration::ZERO, (endpoint.fallback)(now)),
        }
    }
}

async fn settle<T>((delay, result): (Duration, Result<T, ApiError>)) -> Result<T, ApiError> {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    result
}

impl AuthApi for MockApi {
    async fn login(&self, _credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        settle(self.next("login", &self.login)).await
    }

    async fn status(&self) -> Result<StatusResponse, ApiError> {
        settle(self.next("status", &self.status)).await
    }

    async fn refresh(&self) -> Result<RefreshResponse, ApiError> {
        settle(self.next("refresh", &self.refresh)).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        settle(self.next("logout", &self.logout)).await
    }
}

// =========================================================================
// RecordingMonitor
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCall {
    Attach,
    Detach,
}

#[derive(Default)]
struct MonitorState {
    log: Vec<MonitorCall>,
    sink: Option<ActivitySink>,
}

/// Activity monitor that records attach/detach and lets the test fire
/// events through whatever sink is currently attached.
#[derive(Clone, Default)]
pub struct RecordingMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl RecordingMonitor {
    pub fn log(&self) -> Vec<MonitorCall> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().unwrap().sink.is_some()
    }

    /// Simulates user input. Returns `false` when nothing is attached.
    pub fn fire(&self, kind: ActivityKind) -> bool {
        let sink = self.state.lock().unwrap().sink.clone();
        sink.is_some_and(|s| s.record(kind))
    }
}

impl ActivityMonitor for RecordingMonitor {
    fn attach(&mut self, kinds: &[ActivityKind], sink: ActivitySink) {
        assert_eq!(kinds, &ActivityKind::ALL[..]);
        let mut state = self.state.lock().unwrap();
        state.log.push(MonitorCall::Attach);
        state.sink = Some(sink);
    }

    fn detach(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.log.push(MonitorCall::Detach);
        state.sink = None;
    }
}

// =========================================================================
// Harness
// =========================================================================

/// Test timings: ten-minute inactivity window, 2 s refresh buffer.
pub fn config() -> SessionConfig {
    SessionConfig {
        inactivity_timeout_secs: 600,
        refresh_buffer_ms: 2_000,
        ..SessionConfig::default()
    }
}

pub fn profile(role: Role, config: SessionConfig) -> RoleProfile {
    RoleProfile::new(role).with_config(config)
}

pub struct Harness {
    pub handle: SessionHandle,
    pub api: Arc<MockApi>,
    pub events: mpsc::UnboundedReceiver<ShellEvent>,
    pub monitor: RecordingMonitor,
}

impl Harness {
    /// Spawns a session without waiting for the startup check.
    pub fn spawn(profile: RoleProfile, api: Arc<MockApi>) -> Self {
        let (shell, events) = ChannelShell::new();
        let monitor = RecordingMonitor::default();
        let handle = SessionManager::new(profile, Arc::clone(&api), shell)
            .monitor(monitor.clone())
            .clock(api.clock())
            .spawn();
        Self {
            handle,
            api,
            events,
            monitor,
        }
    }

    /// Spawns a session, waits until bootstrap found nobody signed in, and
    /// forgets the bootstrap calls.
    pub async fn logged_out(profile: RoleProfile) -> Self {
        let api = MockApi::new(SessionClock::starting_at(T0));
        let harness = Self::spawn(profile, api);
        let session = harness.handle.ready().await;
        assert!(!session.is_authenticated());
        harness.api.clear_calls();
        harness
    }

    /// Logged-out session, then a successful login whose credential
    /// expires `ttl` from now.
    pub async fn logged_in(profile: RoleProfile, ttl: Duration) -> Self {
        let harness = Self::logged_out(profile).await;
        let ttl_ms = ttl.as_millis() as i64;
        harness
            .api
            .push_login(Step::with(move |now| Ok(login_ok(alice(), now + ttl_ms))));
        harness.handle.login(creds()).await.unwrap();
        harness
    }

    /// Every shell effect emitted so far.
    pub fn drain(&mut self) -> Vec<ShellEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Waits for the next shell effect.
    pub async fn next_event(&mut self) -> ShellEvent {
        self.events.recv().await.expect("shell channel closed")
    }

    /// Round-trips through the actor so every command sent before this
    /// call has been handled.
    pub async fn settle(&self) {
        self.handle.timers().await.unwrap();
    }
}
