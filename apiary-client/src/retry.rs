//! Fixed-interval retry with an explicit deadline
//!
//! The reconciler's waiting is built on this one helper: no hidden
//! global timer, interval and deadline always come from the caller.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Error;

/// Classification of a failed attempt
#[derive(Debug)]
pub enum Retry {
    /// Precondition not met yet; run the whole attempt again after one
    /// interval
    Transient(Error),
    /// Unrecoverable; abort immediately
    Permanent(Error),
}

/// Run `op` until it succeeds, fails permanently, or `timeout` elapses.
///
/// Transient failures sleep one fixed `interval` and rerun the entire
/// attempt. When the next attempt cannot start before the deadline the
/// call aborts with [`Error::Timeout`] carrying the last transient
/// cause; it never hangs.
pub async fn retry_until<T, F, Fut>(interval: Duration, timeout: Duration, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Retry>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(Retry::Permanent(err)) => return Err(err),
            Err(Retry::Transient(err)) => {
                if Instant::now() + interval > deadline {
                    return Err(Error::Timeout {
                        waited: timeout,
                        last: err.to_string(),
                    });
                }
                tracing::debug!(cause = %err, "retrying in {:?}", interval);
                tokio::time::sleep(interval).await;
            }
        }
    }
}
