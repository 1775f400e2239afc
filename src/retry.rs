//! Bounded retry with exponential backoff and jitter for provider calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryCfg;

/// Run `f` until it succeeds, `should_retry` rejects the error, or attempts run out.
pub async fn retry_async<F, Fut, T, E, P>(
    cfg: &RetryCfg,
    mut should_retry: P,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempts_left = cfg.max_attempts.max(1);
    let mut backoff = cfg.base_backoff();
    let max_backoff = cfg.max_backoff();

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left = attempts_left.saturating_sub(1);
                if attempts_left == 0 || !should_retry(&e) {
                    return Err(e);
                }

                let wait = backoff + jitter(cfg.jitter());
                warn!(
                    target: "trivia",
                    error = %e,
                    attempts_left,
                    wait_ms = wait.as_millis() as u64,
                    "Retrying provider call"
                );
                tokio::time::sleep(wait).await;

                backoff = std::cmp::min(backoff.saturating_mul(2), max_backoff);
            }
        }
    }
}

fn jitter(max: Option<Duration>) -> Duration {
    match max {
        Some(max) if !max.is_zero() => {
            let ms = max.as_millis() as u64;
            Duration::from_millis(rand::random::<u64>() % (ms + 1))
        }
        _ => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(attempts: usize) -> RetryCfg {
        RetryCfg { max_attempts: attempts, base_backoff_ms: 1, max_backoff_ms: 2, jitter_ms: 0 }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let res: Result<u32, String> = retry_async(&fast(5), |_| true, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("flaky".to_string())
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(res, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let res: Result<u32, String> = retry_async(&fast(3), |_| true, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("down".to_string())
        })
        .await;
        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let res: Result<u32, String> = retry_async(&fast(5), |e: &String| e != "exhausted", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("exhausted".to_string())
        })
        .await;
        assert_eq!(res, Err("exhausted".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
