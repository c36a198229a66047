//! Storage call timeout helpers
//!
//! Every database round trip is bounded so a stalled backend surfaces as
//! `StorageUnavailable` instead of a hung request.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{AuthError, AuthResult};

/// Default timeout for storage calls (5 seconds)
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Execute a query with timeout
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> AuthResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AuthError>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => {
            tracing::error!("Storage call timed out after {:?}", duration);
            Err(AuthError::StorageUnavailable(format!(
                "storage call timed out after {:?}",
                duration
            )))
        }
    }
}
