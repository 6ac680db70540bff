//! Tests for the fixed-interval retry module

use super::*;
use std::cell::Cell;
use tokio::time::Instant;

// ============================================================================
// RetryPolicy Tests
// ============================================================================

#[test]
fn test_retry_policy_default_values() {
    let policy = RetryPolicy::default();

    assert_eq!(policy.interval, Duration::from_secs(1));
    assert_eq!(policy.max_attempts, None);
    assert!(policy.should_retry(u32::MAX - 1));
}

#[test]
fn test_retry_policy_bounded() {
    let policy = RetryPolicy::from_millis(10).with_max_attempts(2);

    assert_eq!(policy.interval, Duration::from_millis(10));
    assert!(policy.should_retry(1));
    assert!(!policy.should_retry(2));
}

// ============================================================================
// Retry Loop Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_failures_with_fixed_spacing() {
    let policy = RetryPolicy::default();
    let started = Instant::now();
    let calls = Cell::new(0);

    let result: Result<u32, RetryError<String>> =
        retry_with_fixed_delay(&policy, "flaky", |attempt| {
            calls.set(calls.get() + 1);
            async move {
                if attempt < 4 {
                    Err(format!("attempt {} failed", attempt))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 4);
    assert_eq!(calls.get(), 4);
    // Three failures, one interval each, no growth
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_first_success_does_not_sleep() {
    let started = Instant::now();
    let result: Result<&str, RetryError<String>> =
        retry_with_fixed_delay(&RetryPolicy::default(), "ok", |_| async { Ok("done") }).await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_reports_last_error() {
    let policy = RetryPolicy::default().with_max_attempts(3);

    let result: Result<(), RetryError<String>> =
        retry_with_fixed_delay(&policy, "always-down", |attempt| async move {
            Err(format!("down on attempt {}", attempt))
        })
        .await;

    match result {
        Err(RetryError::Exhausted {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error, "down on attempt 3");
        }
        other => panic!("Expected Exhausted, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_if_stops_on_permanent_error() {
    let started = Instant::now();

    let result: Result<(), RetryError<String>> = retry_if(
        &RetryPolicy::default(),
        "permanent",
        |error: &String| error.starts_with("transient"),
        |attempt| async move {
            if attempt == 1 {
                Err("transient glitch".to_string())
            } else {
                Err("permanent failure".to_string())
            }
        },
    )
    .await;

    let error = result.unwrap_err();
    assert!(matches!(error, RetryError::Aborted { attempts: 2, .. }));
    assert_eq!(error.into_inner(), "permanent failure");
    assert_eq!(started.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_retry_forever_ignores_attempt_cap() {
    let policy = RetryPolicy::from_millis(500).with_max_attempts(1);
    let started = Instant::now();

    let value = retry_forever(&policy, "eventually", |attempt| async move {
        if attempt <= 10 {
            Err("not yet")
        } else {
            Ok(attempt)
        }
    })
    .await;

    assert_eq!(value, 11);
    assert_eq!(started.elapsed(), Duration::from_millis(5000));
}
