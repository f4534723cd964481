//! Bounded retry loop shared by the HTTP adapters.

use crate::config::RetryPolicy;
use crate::error::{ErrorKind, ImageGenerationError, Result};
use crate::image::types::ProviderKind;
use std::future::Future;

/// Runs `attempt` until it succeeds, fails with a non-retryable error, or the
/// policy's attempt budget is spent.
///
/// The closure receives the 1-based attempt number. On success the value is
/// returned with the number of attempts used. Attempts are strictly
/// sequential.
pub(crate) async fn run_with_retries<T, F, Fut>(
    provider: ProviderKind,
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<(T, u32)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<ImageGenerationError> = None;

    for n in 1..=policy.max_attempts {
        match attempt(n).await {
            Ok(value) => return Ok((value, n)),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if n < policy.max_attempts {
                    let delay = policy.delay_after(n);
                    tracing::warn!(
                        %provider,
                        attempt = n,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        kind = %e.kind(),
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ImageGenerationError::new(
            ErrorKind::Unknown,
            format!("{provider} generation made no attempts"),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_always_retryable_makes_exactly_three_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<((), u32)> = run_with_retries(ProviderKind::OpenAi, &fast_policy(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ImageGenerationError::with_status(ErrorKind::ServerError, 503, "down")) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert_eq!(err.status_code(), Some(503));
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<((), u32)> = run_with_retries(ProviderKind::Xai, &fast_policy(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ImageGenerationError::with_status(ErrorKind::Authentication, 401, "bad key")) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Authentication);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt_after_rate_limits() {
        let calls = AtomicU32::new(0);
        let (value, attempts) = run_with_retries(ProviderKind::Imagen, &fast_policy(), |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(ImageGenerationError::with_status(ErrorKind::RateLimit, 429, "slow down"))
                } else {
                    Ok("image")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "image");
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error() {
        let (value, attempts) = run_with_retries(ProviderKind::OpenAi, &fast_policy(), |n| async move {
            match n {
                1 => Err(ImageGenerationError::new(ErrorKind::NetworkError, "reset")),
                _ => Ok(n),
            }
        })
        .await
        .unwrap();
        assert_eq!((value, attempts), (2, 2));

        let err = run_with_retries::<(), _, _>(ProviderKind::OpenAi, &fast_policy(), |n| async move {
            let kind = if n == 3 { ErrorKind::RateLimit } else { ErrorKind::NetworkError };
            Err(ImageGenerationError::new(kind, format!("attempt {n}")))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.message(), "attempt 3");
    }

    #[tokio::test]
    async fn test_zero_budget_yields_unknown() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let err = run_with_retries::<(), _, _>(ProviderKind::OpenAi, &policy, |_| async { Ok(()) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_backoff_is_linear() {
        let policy = RetryPolicy::new(3, Duration::from_millis(20));
        let start = tokio::time::Instant::now();
        let _ = run_with_retries::<(), _, _>(ProviderKind::OpenAi, &policy, |_| async {
            Err(ImageGenerationError::new(ErrorKind::NetworkError, "reset"))
        })
        .await;
        // 20ms after attempt 1, 40ms after attempt 2, none after the last.
        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
