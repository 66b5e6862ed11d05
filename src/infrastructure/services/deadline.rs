//! Bounded port calls

use std::future::Future;
use std::time::Duration;

use crate::domain::DomainError;

/// Default upper bound for a single storage, embedding or index call
pub const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_secs(2);

/// Run a port call, failing with [`DomainError::Timeout`] once `limit` elapses
///
/// The inner future is dropped on timeout, cancelling the call.
pub async fn within<T, F>(operation: &str, limit: Duration, call: F) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(DomainError::timeout(
            operation,
            u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}
