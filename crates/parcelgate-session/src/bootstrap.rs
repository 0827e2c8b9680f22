//! Startup check: does the cookie jar hold a live session?

use std::time::Duration;

use parcelgate_protocol::{ExpiresAt, Principal, Role, StatusResponse};
use parcelgate_transport::AuthApi;

use crate::call::bounded;

/// How bootstrap ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BootstrapOutcome {
    Established {
        principal: Principal,
        expires_at: Option<ExpiresAt>,
    },
    LoggedOut,
}

fn established(status: StatusResponse) -> Option<BootstrapOutcome> {
    let principal = status.authenticated_principal()?.clone();
    Some(BootstrapOutcome::Established {
        principal,
        expires_at: status.expires_at,
    })
}

/// Asks the backend for the current session, with one silent refresh if
/// it says nobody is signed in.
///
/// Never fails: every error path ends logged out. Never notifies or
/// navigates either; a visitor who simply isn't signed in is not an event.
pub(crate) async fn bootstrap<A: AuthApi>(
    api: &A,
    role: Role,
    limit: Duration,
) -> BootstrapOutcome {
    match bounded(limit, api.status()).await {
        Ok(status) => {
            if let Some(outcome) = established(status) {
                tracing::debug!(%role, "existing session found");
                return outcome;
            }
        }
        Err(err) if err.is_auth() => {}
        Err(err) => {
            tracing::info!(%role, error = %err, "status check failed, starting logged out");
            return BootstrapOutcome::LoggedOut;
        }
    }

    // The access credential may just have lapsed while the refresh
    // credential is still good.
    let refreshed = match bounded(limit, api.refresh()).await {
        Ok(refreshed) => refreshed,
        Err(err) => {
            tracing::debug!(%role, error = %err, "no refreshable session");
            return BootstrapOutcome::LoggedOut;
        }
    };

    match bounded(limit, api.status()).await {
        Ok(status) => match established(status) {
            Some(BootstrapOutcome::Established {
                principal,
                expires_at,
            }) => {
                tracing::debug!(%role, "session restored by refresh");
                BootstrapOutcome::Established {
                    principal,
                    expires_at: expires_at.or(Some(refreshed.expires_at)),
                }
            }
            _ => BootstrapOutcome::LoggedOut,
        },
        Err(err) => {
            tracing::info!(%role, error = %err, "status after refresh failed, starting logged out");
            BootstrapOutcome::LoggedOut
        }
    }
}
