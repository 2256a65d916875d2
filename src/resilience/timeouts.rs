//! Timeout enforcement.
//!
//! Every suspension point of a connection (read, write, generate) runs under
//! a deadline. Timeout errors are distinct from the wrapped operation's own
//! errors so callers can map them to their own status codes.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The wrapped operation did not finish in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Run `fut` with a deadline of `limit` from now.
pub async fn bounded<F, T>(limit: Duration, fut: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| TimedOut(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pending_future_times_out() {
        let result = bounded(Duration::from_secs(2), std::future::pending::<()>()).await;
        assert_eq!(result, Err(TimedOut(Duration::from_secs(2))));
    }

    #[tokio::test]
    async fn ready_future_passes_through() {
        assert_eq!(bounded(Duration::from_secs(1), async { 7 }).await, Ok(7));
    }
}
