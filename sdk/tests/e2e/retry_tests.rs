//! Activity retry tests: failed attempts are recorded, retried after the
//! backoff, and the last outcome resolves the call.

use crate::engine;
use durable_sdk::error::{ActivityFailureCause, DurableError, FailureType};
use durable_sdk::testing::MockActivityExecutor;
use durable_sdk::{ActivityError, EventType};
use serde_json::json;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_flaky_activity_succeeds_on_retry() {
    let executor = MockActivityExecutor::new()
        .with_responses("flaky", vec![Err(ActivityError::application("connection reset"))])
        .with_result("flaky", json!({"ok": true}));
    let engine = engine(executor.clone());

    let id = engine.start("flaky-workflow", json!({"n": 1})).await.unwrap();
    assert_eq!(engine.get_result(&id).await.unwrap(), json!({"ok": true}));

    let history = engine.history(&id).await.unwrap();
    assert_eq!(
        history.event_types(),
        vec![
            EventType::WorkflowStarted,
            EventType::ActivityScheduled,
            EventType::ActivityAttemptFailed,
            EventType::ActivityCompleted,
            EventType::WorkflowCompleted,
        ]
    );
    let attempt_failed = &history.events()[2];
    assert_eq!(attempt_failed.get_string("error"), Some("connection reset"));
    assert_eq!(history.events()[3].get_u32("attempt"), Some(2));

    let attempts: Vec<u32> = executor.calls().iter().map(|c| c.attempt).collect();
    assert_eq!(attempts, vec![1, 2]);
    assert!(executor.calls().iter().all(|c| c.correlation_token == 0));
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_fail_execution() {
    let executor =
        MockActivityExecutor::new().with_error("flaky", ActivityError::application("down"));
    let engine = engine(executor.clone());

    let started = tokio::time::Instant::now();
    let id = engine.start("flaky-workflow", json!(null)).await.unwrap();
    let err = engine.get_result(&id).await.unwrap_err();

    assert!(matches!(
        err,
        DurableError::WorkflowFailed {
            failure_type: FailureType::ActivityFailure,
            ..
        }
    ));
    assert_eq!(executor.call_count("flaky"), 3);
    // 1s before the second attempt, 2s before the third
    assert!(started.elapsed() >= Duration::from_secs(3));

    let history = engine.history(&id).await.unwrap();
    assert_eq!(history.events_of_type(EventType::ActivityAttemptFailed).len(), 2);
    assert_eq!(history.events_of_type(EventType::ActivityFailed).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_skips_retries() {
    let executor = MockActivityExecutor::new()
        .with_error("flaky", ActivityError::non_retryable("account closed"));
    let engine = engine(executor.clone());

    let id = engine.start("flaky-workflow", json!(null)).await.unwrap();
    assert!(engine.get_result(&id).await.is_err());
    assert_eq!(executor.call_count("flaky"), 1);

    let history = engine.history(&id).await.unwrap();
    assert!(history.events_of_type(EventType::ActivityAttemptFailed).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_is_retried_then_reported() {
    let executor = MockActivityExecutor::new().hanging("flaky");
    let engine = engine(executor.clone());

    let id = engine.start("flaky-workflow", json!(null)).await.unwrap();
    assert!(engine.get_result(&id).await.is_err());
    assert_eq!(executor.call_count("flaky"), 3);

    let history = engine.history(&id).await.unwrap();
    let failed = history.events_of_type(EventType::ActivityFailed);
    let cause = failed[0]
        .get_string("cause")
        .and_then(ActivityFailureCause::parse);
    assert_eq!(cause, Some(ActivityFailureCause::Timeout));
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_times_out_at_start_to_close() {
    let executor = MockActivityExecutor::new().hanging("ssn-trace");
    let engine = engine(executor.clone());

    let started = tokio::time::Instant::now();
    let id = engine.start("background-check", "555-55-5555").await.unwrap();
    assert!(engine.get_result(&id).await.is_err());

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed < Duration::from_secs(11));
    assert_eq!(executor.call_count("ssn-trace"), 1);

    let history = engine.history(&id).await.unwrap();
    let failed = history.events_of_type(EventType::ActivityFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].get_string("cause"), Some("TIMEOUT"));
}
