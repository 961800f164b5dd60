//! Bounded linear backoff: 5 tries, 5-second unit, sleep grows with the
//! attempt number. Sync flavor for git plumbing, async flavor for HTTP
//! clients.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Default number of attempts before giving up.
pub const DEFAULT_TRIES: u32 = 5;

/// Default backoff unit; attempt `n` sleeps `unit * n` before retrying.
pub const DEFAULT_UNIT: Duration = Duration::from_secs(5);

/// Retries `op` up to `tries` times, sleeping `unit * attempt` between
/// attempts. Returns the last error once attempts are exhausted.
pub fn retry_sync<T, E, F>(what: &str, tries: u32, unit: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= tries {
                    return Err(e);
                }
                warn!(
                    "[tries left: {}] {} failed: {}",
                    tries - attempt,
                    what,
                    e
                );
                std::thread::sleep(unit * attempt);
            }
        }
    }
}

/// Async variant. `retryable` decides whether an error is worth another
/// attempt; a non-retryable error is returned immediately.
pub async fn retry_async<T, E, F, Fut, P>(
    what: &str,
    tries: u32,
    unit: Duration,
    retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= tries || !retryable(&e) {
                    return Err(e);
                }
                warn!(
                    "[tries left: {}] {} failed: {}",
                    tries - attempt,
                    what,
                    e
                );
                tokio::time::sleep(unit * attempt).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn retry_sync_returns_first_success() {
        let calls = AtomicU32::new(0);
        let res: Result<u32, String> = retry_sync("op", 5, Duration::ZERO, || {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("not yet".to_string())
            } else {
                Ok(7)
            }
        });
        assert_eq!(res, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retry_sync_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let res: Result<(), String> = retry_sync("op", 5, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom".to_string())
        });
        assert_eq!(res, Err("boom".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn retry_async_stops_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let res: Result<(), String> = retry_async(
            "op",
            5,
            Duration::ZERO,
            |e: &String| e == "transient",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            },
        )
        .await;
        assert_eq!(res, Err("fatal".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_async_retries_transient() {
        let calls = AtomicU32::new(0);
        let res: Result<u32, String> = retry_async(
            "op",
            5,
            Duration::ZERO,
            |_: &String| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err("transient".to_string())
                    } else {
                        Ok(1)
                    }
                }
            },
        )
        .await;
        assert_eq!(res, Ok(1));
    }
}
