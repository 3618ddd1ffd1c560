/*!
 * Tests for per-call timeouts and exponential backoff
 */

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use polysub::errors::ProviderError;
use polysub::retry::RetryPolicy;

/// Test that a transient failure is retried until it succeeds
#[tokio::test]
async fn test_run_withTransientFailure_shouldSucceedOnRetry() {
    let policy = RetryPolicy::new(2, 1, Duration::from_secs(1));
    let calls = AtomicU32::new(0);

    let result = policy
        .run("flaky", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProviderError::ConnectionError("reset".to_string()))
            } else {
                Ok(42)
            }
        })
        .await;

    assert_eq!(result, Ok(42));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test that exhausting retries reports every attempt and the last error
#[tokio::test]
async fn test_run_withPersistentFailure_shouldReportAttempts() {
    let policy = RetryPolicy::new(2, 1, Duration::from_secs(1));

    let failure = policy
        .run("broken", || async { Err::<(), _>(ProviderError::RateLimitExceeded("slow down".to_string())) })
        .await
        .unwrap_err();

    assert_eq!(failure.attempts, 3);
    assert!(matches!(failure.last_error, ProviderError::RateLimitExceeded(_)));
}

/// Test that a hanging call is cut off by the per-call timeout
#[tokio::test]
async fn test_run_withHangingCall_shouldTimeOut() {
    let policy = RetryPolicy::no_retry(Duration::from_millis(20));

    let failure = policy
        .run("hang", || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<(), ProviderError>(())
        })
        .await
        .unwrap_err();

    assert_eq!(failure.attempts, 1);
    assert_eq!(failure.last_error, ProviderError::Timeout(Duration::from_millis(20)));
}

/// Test that backoff doubles with bounded jitter
#[test]
fn test_backoff_delay_withBase_shouldDoubleEachRetry() {
    let policy = RetryPolicy::new(3, 100, Duration::from_secs(1));

    for (retry, base) in [(1, 100), (2, 200), (3, 400)] {
        let delay = policy.backoff_delay(retry).as_millis() as u64;
        assert!(delay >= base && delay <= base + 25, "retry {} waited {}ms", retry, delay);
    }
    assert_eq!(RetryPolicy::no_retry(Duration::from_secs(1)).backoff_delay(1), Duration::ZERO);
}
