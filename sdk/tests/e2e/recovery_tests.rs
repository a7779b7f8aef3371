//! Recovery tests: a second engine over the same store resumes executions
//! the first one left open, without repeating recorded work.

use crate::{engine_builder, settle};
use durable_sdk::testing::MockActivityExecutor;
use durable_sdk::{EventType, ExecutionStatus, History, HistoryStore, InMemoryHistoryStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn shared_store() -> Arc<dyn HistoryStore> {
    Arc::new(InMemoryHistoryStore::new())
}

#[tokio::test(start_paused = true)]
async fn test_recover_redispatches_outstanding_activity() {
    let store = shared_store();

    let first_executor = MockActivityExecutor::new()
        .with_result("step-one", json!("one"))
        .hanging("step-two");
    let first = engine_builder(store.clone(), first_executor.clone())
        .build()
        .unwrap();
    let id = first.start("two-step", json!({"order": 9})).await.unwrap();
    settle().await;
    assert_eq!(first_executor.call_count("step-two"), 1);
    first.shutdown().await;
    assert_eq!(store.describe(&id).await.unwrap().status, ExecutionStatus::Running);

    let second_executor = MockActivityExecutor::new()
        .with_result("step-one", json!("one"))
        .with_result("step-two", json!("two"));
    let second = engine_builder(store.clone(), second_executor.clone())
        .build()
        .unwrap();
    second.recover(&id).await.unwrap();

    assert_eq!(second.get_result(&id).await.unwrap(), json!(["one", "two"]));
    assert_eq!(second_executor.call_count("step-one"), 0);
    assert_eq!(second_executor.call_count("step-two"), 1);
    assert_eq!(second_executor.calls()[0].correlation_token, 1);

    let history = store.read(&id).await.unwrap();
    assert_eq!(history.events_of_type(EventType::ActivityScheduled).len(), 2);
    assert_eq!(history.events_of_type(EventType::ActivityCompleted).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_recover_all_restores_timers() {
    let store = shared_store();

    let first = engine_builder(store.clone(), MockActivityExecutor::new())
        .build()
        .unwrap();
    let id = first
        .start("delayed-background-check", "555-55-5555")
        .await
        .unwrap();
    settle().await;
    first.shutdown().await;

    let executor = MockActivityExecutor::new().with_result("ssn-trace", json!("pass"));
    let second = engine_builder(store.clone(), executor.clone()).build().unwrap();
    let recovered = second.recover_all().await.unwrap();
    assert_eq!(recovered, vec![id.clone()]);

    assert_eq!(second.get_result(&id).await.unwrap(), json!("pass"));

    let history = store.read(&id).await.unwrap();
    assert_eq!(history.events_of_type(EventType::TimerStarted).len(), 1);
    assert_eq!(history.events_of_type(EventType::TimerFired).len(), 1);
    assert_eq!(executor.call_count("ssn-trace"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_released_execution_recovers_in_same_engine() {
    let engine = engine_builder(shared_store(), MockActivityExecutor::new())
        .build()
        .unwrap();
    let id = engine.start("work-queue", json!(null)).await.unwrap();
    engine.signal(&id, "add", "invoice-1").await.unwrap();
    engine.release(&id).await.unwrap();

    engine.recover(&id).await.unwrap();
    settle().await;
    assert_eq!(engine.query(&id, "items").await.unwrap(), json!(["invoice-1"]));

    engine.signal(&id, "stop", json!(null)).await.unwrap();
    assert_eq!(engine.get_result(&id).await.unwrap(), json!(["invoice-1"]));
}

#[tokio::test(start_paused = true)]
async fn test_recover_closed_execution_is_noop() {
    let store = shared_store();
    let executor = MockActivityExecutor::new().with_result("ssn-trace", json!("pass"));
    let engine = engine_builder(store.clone(), executor.clone()).build().unwrap();

    let id = engine.start("background-check", "555-55-5555").await.unwrap();
    engine.get_result(&id).await.unwrap();
    let events = store.read(&id).await.unwrap().len();

    engine.recover(&id).await.unwrap();
    settle().await;
    assert_eq!(store.read(&id).await.unwrap().len(), events);
    assert_eq!(executor.total_calls(), 1);
    assert!(engine.recover_all().await.unwrap().is_empty());
}

fn delayed_steps() -> MockActivityExecutor {
    MockActivityExecutor::new()
        .with_result("step-one", json!("one"))
        .with_delay("step-one", Duration::from_secs(5))
        .with_result("step-two", json!("two"))
        .with_delay("step-two", Duration::from_secs(60))
}

/// Check that the history was written by one writer at a time
fn assert_single_writer(history: &History) {
    let sequences: Vec<i32> = history.events().iter().map(|e| e.sequence_number()).collect();
    let expected: Vec<i32> = (1..=sequences.len() as i32).collect();
    assert_eq!(sequences, expected);

    let scheduled: Vec<Option<u32>> = history
        .events_of_type(EventType::ActivityScheduled)
        .iter()
        .map(|e| e.correlation_token())
        .collect();
    assert_eq!(scheduled, vec![Some(0), Some(1)]);
    let completed: Vec<Option<u32>> = history
        .events_of_type(EventType::ActivityCompleted)
        .iter()
        .map(|e| e.correlation_token())
        .collect();
    assert_eq!(completed, vec![Some(0), Some(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_two_engines_on_one_store_keep_a_single_writer() {
    let store = shared_store();
    let first_executor = delayed_steps();
    let second_executor = delayed_steps();
    let first = engine_builder(store.clone(), first_executor.clone())
        .build()
        .unwrap();
    let second = engine_builder(store.clone(), second_executor.clone())
        .build()
        .unwrap();

    let id = first.start("two-step", json!({"order": 3})).await.unwrap();
    second.recover(&id).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(first.running_count() + second.running_count(), 1);

    let (winner, loser) = if first.running_count() == 1 {
        (&first, &second)
    } else {
        (&second, &first)
    };
    assert_eq!(winner.get_result(&id).await.unwrap(), json!(["one", "two"]));
    assert_eq!(loser.get_result(&id).await.unwrap(), json!(["one", "two"]));

    assert_single_writer(&store.read(&id).await.unwrap());
    assert_eq!(
        first_executor.call_count("step-two") + second_executor.call_count("step-two"),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_recovery_records_one_completion() {
    let store = shared_store();
    let first_executor = delayed_steps();
    let second_executor = delayed_steps();
    let first = engine_builder(store.clone(), first_executor.clone())
        .build()
        .unwrap();
    let id = first.start("two-step", json!({"order": 4})).await.unwrap();
    settle().await;
    assert_eq!(first_executor.call_count("step-one"), 1);

    // Both engines now run step-one and race to record its completion
    let second = engine_builder(store.clone(), second_executor.clone())
        .build()
        .unwrap();
    second.recover(&id).await.unwrap();
    settle().await;
    assert_eq!(second_executor.call_count("step-one"), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(first.running_count() + second.running_count(), 1);

    let (winner, loser) = if first.running_count() == 1 {
        (&first, &second)
    } else {
        (&second, &first)
    };
    assert_eq!(winner.get_result(&id).await.unwrap(), json!(["one", "two"]));
    assert_eq!(loser.get_result(&id).await.unwrap(), json!(["one", "two"]));
    assert_single_writer(&store.read(&id).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_recover_spawns_one_task() {
    let store = shared_store();
    let first = engine_builder(store.clone(), MockActivityExecutor::new().hanging("step-one"))
        .build()
        .unwrap();
    let id = first.start("two-step", json!({"order": 5})).await.unwrap();
    settle().await;
    first.shutdown().await;

    let executor = MockActivityExecutor::new().hanging("step-one");
    let second = engine_builder(store.clone(), executor.clone()).build().unwrap();
    let (a, b) = tokio::join!(second.recover(&id), second.recover(&id));
    a.unwrap();
    b.unwrap();
    settle().await;

    assert_eq!(second.running_count(), 1);
    assert_eq!(executor.call_count("step-one"), 1);
}
