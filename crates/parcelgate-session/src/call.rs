use std::future::Future;
use std::time::Duration;

use parcelgate_transport::ApiError;

/// Runs a backend call under a hard deadline.
///
/// The HTTP client has its own timeout, but `AuthApi` implementations are
/// pluggable; this bound holds whatever the implementation does, so a hung
/// request can never stall the session.
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout),
    }
}
