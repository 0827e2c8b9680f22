//! Silent refresh chain and activity recheck, under paused time.

mod common;

use common::*;
use parcelgate_protocol::Role;
use parcelgate_session::{
    ActivityKind, LogoutReason, Navigation, SessionConfig, ShellEvent,
};
use parcelgate_transport::ApiError;
use tokio::time::Instant;

fn assert_notified(event: &ShellEvent, reason: LogoutReason) {
    match event {
        ShellEvent::Notify(n) => assert_eq!(n.reason, reason, "{n:?}"),
        other => panic!("expected a notification, got {other:?}"),
    }
}

/// Lets spawned backend calls finish and their results reach the actor.
async fn let_jobs_finish(h: &Harness) {
    tokio::time::sleep(millis(1)).await;
    h.settle().await;
}

// =========================================================================
// Scheduling and chaining
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_fires_buffer_before_expiry() {
    let h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    h.api.refresh_extends_by(secs(10));

    tokio::time::sleep(secs(9)).await;

    assert_eq!(h.api.calls_to("refresh"), vec![secs(8)]);
}

#[tokio::test(start_paused = true)]
async fn test_successful_refresh_rearms_exactly_one_timer() {
    let h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    h.api.refresh_extends_by(secs(10));

    tokio::time::sleep(secs(9)).await;
    let timers = h.handle.timers().await.unwrap();

    // Refreshed at 8 s to expire at 18 s: next attempt at 16 s.
    assert_eq!(timers.refresh, Some(secs(7)));
    assert!(!timers.refresh_in_flight);

    tokio::time::sleep(secs(30)).await;
    assert_eq!(
        h.api.calls_to("refresh"),
        vec![secs(8), secs(16), secs(24), secs(32)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_expiry_inside_buffer_refreshes_immediately() {
    let h = Harness::logged_out(profile(Role::Customer, config())).await;
    h.api.refresh_extends_by(secs(60));
    h.api.push_login(Step::ok(login_ok(alice(), T0 + 1_000)));

    h.handle.login(creds()).await.unwrap();
    let_jobs_finish(&h).await;

    assert_eq!(h.api.calls_to("refresh"), vec![secs(0)]);
    assert!(h.handle.snapshot().is_authenticated());
    let timers = h.handle.timers().await.unwrap();
    assert!(timers.refresh.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_already_expired_login_refreshes_immediately() {
    let h = Harness::logged_out(profile(Role::Customer, config())).await;
    h.api.refresh_extends_by(secs(60));
    h.api.push_login(Step::ok(login_ok(alice(), T0 - 30_000)));

    h.handle.login(creds()).await.unwrap();
    let_jobs_finish(&h).await;

    assert_eq!(h.api.count("refresh"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_replaces_principal_when_backend_sends_one() {
    let h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    h.api.push_refresh(Step::with(|now| {
        Ok(parcelgate_protocol::RefreshResponse {
            expires_at: parcelgate_protocol::ExpiresAt::from_millis(now + 60_000),
            principal: Some(principal("u-1", "Alice Liddell")),
        })
    }));

    tokio::time::sleep(secs(9)).await;

    let session = h.handle.snapshot();
    assert_eq!(
        session.principal().map(|p| p.name.as_str()),
        Some("Alice Liddell")
    );
}

#[tokio::test(start_paused = true)]
async fn test_refresh_without_principal_keeps_current_one() {
    let h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    h.api.refresh_extends_by(secs(60));

    tokio::time::sleep(secs(9)).await;

    assert_eq!(
        h.handle.snapshot().principal().map(|p| p.name.as_str()),
        Some("Alice")
    );
}

// =========================================================================
// Failures
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_unauthorized_ends_session_as_expired() {
    let start = Instant::now();
    let mut h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;

    let event = h.next_event().await;

    assert_eq!(start.elapsed(), secs(8));
    assert_notified(&event, LogoutReason::SessionExpired);
    assert_eq!(
        h.next_event().await,
        ShellEvent::Navigate(Navigation::replace("/login"))
    );

    let session = h.handle.snapshot();
    assert!(!session.is_authenticated());
    assert_eq!(session.principal(), None);
    let timers = h.handle.timers().await.unwrap();
    assert_eq!(timers.inactivity, None);
    assert_eq!(timers.refresh, None);
    assert_eq!(h.api.count("logout"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_forbidden_ends_session_as_expired() {
    let mut h = Harness::logged_in(profile(Role::Staff, config()), secs(10)).await;
    h.api.push_refresh(Step::err(ApiError::Forbidden));

    assert_notified(&h.next_event().await, LogoutReason::SessionExpired);
    assert!(!h.handle.snapshot().is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_malformed_response_ends_session() {
    let mut h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    h.api
        .push_refresh(Step::err(ApiError::Malformed("missing field `expiresAt`".into())));

    assert_notified(&h.next_event().await, LogoutReason::SessionExpired);
    assert_eq!(h.api.count("refresh"), 1, "malformed replies are not retried");
}

#[tokio::test(start_paused = true)]
async fn test_transient_refresh_failures_retry_then_recover() {
    let mut h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    h.api.push_refresh(Step::err(ApiError::Server(502)));
    h.api.push_refresh(Step::err(ApiError::Network("reset".into())));
    h.api.refresh_extends_by(secs(60));

    tokio::time::sleep(secs(40)).await;

    let calls = h.api.calls_to("refresh");
    assert_eq!(calls.len(), 3, "{calls:?}");
    assert_eq!(calls[0], secs(8));
    // 1 s then 2 s of backoff, each with up to 20 % jitter.
    assert!(calls[1] >= secs(9) && calls[1] <= millis(9_200), "{calls:?}");
    assert!(calls[2] >= calls[1] + secs(2), "{calls:?}");
    assert!(h.handle.snapshot().is_authenticated());
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_retries_exhausted_ends_session() {
    let mut h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    for _ in 0..4 {
        h.api.push_refresh(Step::err(ApiError::Server(503)));
    }

    assert_notified(&h.next_event().await, LogoutReason::SessionExpired);

    // One attempt plus three retries.
    assert_eq!(h.api.count("refresh"), 4);
    assert!(!h.handle.snapshot().is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_fails_closed_on_first_transient_error() {
    let config = SessionConfig {
        refresh_max_retries: 0,
        ..config()
    };
    let mut h = Harness::logged_in(profile(Role::Customer, config), secs(10)).await;
    h.api.push_refresh(Step::err(ApiError::Timeout));

    assert_notified(&h.next_event().await, LogoutReason::SessionExpired);
    assert_eq!(h.api.count("refresh"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_refresh_times_out_and_is_retried() {
    let h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    h.api
        .push_refresh(Step::ok(refresh_ok(T0 + 600_000)).after(secs(60)));
    h.api.refresh_extends_by(secs(60));

    tokio::time::sleep(secs(12)).await;
    let timers = h.handle.timers().await.unwrap();
    assert!(timers.refresh_in_flight, "first attempt still pending at 12 s");

    tokio::time::sleep(secs(18)).await;

    let calls = h.api.calls_to("refresh");
    assert_eq!(calls.len(), 2, "{calls:?}");
    // Timed out at 16 s, retried after about a second.
    assert!(calls[1] >= secs(17) && calls[1] <= millis(17_200), "{calls:?}");
    assert!(h.handle.snapshot().is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_returning_due_expiry_backs_off_instead_of_spinning() {
    let mut h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    // Every refresh claims the credential expires one second from now,
    // which is already inside the 2 s buffer.
    h.api.refresh_extends_by(secs(1));

    assert_notified(&h.next_event().await, LogoutReason::SessionExpired);
    assert_eq!(h.api.count("refresh"), 4);
}

// =========================================================================
// Stale results
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_result_after_logout_is_dropped() {
    let mut h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    h.api.push_refresh(Step::with(|now| {
        Ok(parcelgate_protocol::RefreshResponse {
            expires_at: parcelgate_protocol::ExpiresAt::from_millis(now + 600_000),
            principal: Some(principal("u-666", "Mallory")),
        })
    })
    .after(secs(5)));

    // Refresh starts at 8 s and answers at 13 s; the user leaves at 9 s
    // and someone else signs in.
    tokio::time::sleep(secs(9)).await;
    h.handle.logout().await.unwrap();
    h.api
        .push_login(Step::ok(login_ok(principal("u-2", "Bob"), T0 + 3_600_000)));
    h.handle.login(creds()).await.unwrap();

    tokio::time::sleep(secs(11)).await;

    let session = h.handle.snapshot();
    assert_eq!(session.principal().map(|p| p.name.as_str()), Some("Bob"));
    let timers = h.handle.timers().await.unwrap();
    // Bob's chain: 3600 s - 2 s buffer, counted from 0, now at 20 s.
    assert_eq!(timers.refresh, Some(secs(3_578)));

    let events = h.drain();
    assert_eq!(events.len(), 2, "only the manual logout: {events:?}");
    assert_notified(&events[0], LogoutReason::Manual);
}

#[tokio::test(start_paused = true)]
async fn test_no_refresh_after_logout() {
    let h = Harness::logged_in(profile(Role::Customer, config()), secs(10)).await;
    h.api.refresh_extends_by(secs(10));

    tokio::time::sleep(secs(1)).await;
    h.handle.logout().await.unwrap();
    tokio::time::sleep(secs(120)).await;

    assert_eq!(h.api.count("refresh"), 0);
}

// =========================================================================
// End to end
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_chain_and_inactivity_end_to_end() {
    let config = SessionConfig {
        inactivity_timeout_secs: 15,
        refresh_buffer_ms: 2_000,
        ..config()
    };
    let start = Instant::now();
    let mut h = Harness::logged_in(profile(Role::Customer, config), secs(10)).await;
    h.api.refresh_extends_by(secs(10));

    tokio::time::sleep(secs(5)).await;
    assert!(h.monitor.fire(ActivityKind::PointerMove));

    let event = h.next_event().await;

    assert_eq!(start.elapsed(), secs(20), "no logout before 20 s");
    assert_notified(&event, LogoutReason::Inactivity);
    assert_eq!(h.api.calls_to("refresh"), vec![secs(8), secs(16)]);
    assert_eq!(h.api.calls_to("logout"), vec![secs(20)]);

    tokio::time::sleep(secs(60)).await;
    assert_eq!(h.api.count("refresh"), 2, "chain stops with the session");
}

// =========================================================================
// Activity recheck
// =========================================================================

fn rechecking() -> SessionConfig {
    SessionConfig {
        activity_recheck_secs: Some(60),
        ..config()
    }
}

#[tokio::test(start_paused = true)]
async fn test_recheck_is_off_by_default() {
    let h = Harness::logged_in(profile(Role::Customer, config()), secs(3600)).await;

    tokio::time::sleep(secs(120)).await;
    h.monitor.fire(ActivityKind::Click);
    let_jobs_finish(&h).await;

    assert_eq!(h.api.count("status"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_recheck_is_rate_limited() {
    let h = Harness::logged_in(profile(Role::Customer, rechecking()), secs(3600)).await;
    h.api.status_always(authed(alice(), None));

    tokio::time::sleep(secs(30)).await;
    h.monitor.fire(ActivityKind::Click);
    let_jobs_finish(&h).await;
    assert_eq!(h.api.count("status"), 0, "within a minute of login");

    tokio::time::sleep(secs(31)).await;
    for _ in 0..10 {
        h.monitor.fire(ActivityKind::PointerMove);
    }
    let_jobs_finish(&h).await;
    assert_eq!(h.api.count("status"), 1);

    tokio::time::sleep(secs(61)).await;
    h.monitor.fire(ActivityKind::KeyPress);
    let_jobs_finish(&h).await;
    assert_eq!(h.api.count("status"), 2);
    assert!(h.handle.snapshot().is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_recheck_unauthenticated_ends_session() {
    let mut h = Harness::logged_in(profile(Role::Customer, rechecking()), secs(3600)).await;

    tokio::time::sleep(secs(61)).await;
    h.monitor.fire(ActivityKind::Scroll);

    assert_notified(&h.next_event().await, LogoutReason::SessionExpired);
    assert!(!h.handle.snapshot().is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_recheck_unauthorized_ends_session() {
    let mut h = Harness::logged_in(profile(Role::Customer, rechecking()), secs(3600)).await;
    h.api.push_status(Step::err(ApiError::Unauthorized));

    tokio::time::sleep(secs(61)).await;
    h.monitor.fire(ActivityKind::TouchStart);

    assert_notified(&h.next_event().await, LogoutReason::SessionExpired);
}

#[tokio::test(start_paused = true)]
async fn test_recheck_transient_error_is_ignored() {
    let mut h = Harness::logged_in(profile(Role::Customer, rechecking()), secs(3600)).await;
    h.api.push_status(Step::err(ApiError::Server(500)));

    tokio::time::sleep(secs(61)).await;
    h.monitor.fire(ActivityKind::Click);
    let_jobs_finish(&h).await;

    assert_eq!(h.api.count("status"), 1);
    assert!(h.handle.snapshot().is_authenticated());
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_recheck_refreshes_principal_and_expiry() {
    let h = Harness::logged_in(profile(Role::Customer, rechecking()), secs(3600)).await;
    h.api.push_status(Step::ok(authed(
        principal("u-1", "Alice Liddell"),
        Some(T0 + 7_200_000),
    )));

    tokio::time::sleep(secs(61)).await;
    h.monitor.fire(ActivityKind::Click);
    let_jobs_finish(&h).await;

    assert_eq!(
        h.handle.snapshot().principal().map(|p| p.name.as_str()),
        Some("Alice Liddell")
    );
    let timers = h.handle.timers().await.unwrap();
    // 7200 s - 2 s buffer, now at 61.001 s.
    assert_eq!(timers.refresh, Some(millis(7_136_999)));
}

#[tokio::test(start_paused = true)]
async fn test_recheck_answered_after_refresh_keeps_newer_expiry() {
    let h = Harness::logged_in(profile(Role::Customer, rechecking()), secs(120)).await;
    h.api.refresh_extends_by(secs(120));
    // Sent at 117 s, answered at 119 s with the expiry from login.
    h.api
        .push_status(Step::ok(authed(alice(), Some(T0 + 120_000))).after(secs(2)));

    tokio::time::sleep(secs(117)).await;
    h.monitor.fire(ActivityKind::Click);
    tokio::time::sleep(secs(83)).await;

    assert_eq!(h.api.calls_to("status"), vec![secs(117)]);
    assert_eq!(h.api.calls_to("refresh"), vec![secs(118)]);
    let timers = h.handle.timers().await.unwrap();
    // Refreshed at 118 s to expire at 238 s: next attempt at 236 s.
    assert_eq!(timers.refresh, Some(secs(36)));
    assert!(h.handle.snapshot().is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_recheck_result_after_logout_is_dropped() {
    let mut h = Harness::logged_in(profile(Role::Customer, rechecking()), secs(3600)).await;
    h.api.push_status(Step::ok(unauthed()).after(secs(5)));

    tokio::time::sleep(secs(61)).await;
    h.monitor.fire(ActivityKind::Click);
    h.settle().await;
    h.handle.logout().await.unwrap();
    h.api.push_login(Step::ok(login_ok(alice(), T0 + 3_600_000)));
    h.handle.login(creds()).await.unwrap();

    tokio::time::sleep(secs(10)).await;

    assert!(h.handle.snapshot().is_authenticated());
    let events = h.drain();
    assert_eq!(events.len(), 2, "{events:?}");
    assert_notified(&events[0], LogoutReason::Manual);
}
