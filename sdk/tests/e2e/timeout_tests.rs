//! Execution timeout tests

use crate::{engine, engine_builder};
use durable_sdk::error::DurableError;
use durable_sdk::testing::MockActivityExecutor;
use durable_sdk::{EngineConfig, EventType, ExecutionStatus, InMemoryHistoryStore, StartWorkflowOptions};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_workflow_timeout_closes_history() {
    let engine = engine(MockActivityExecutor::new());
    let started = Instant::now();

    let id = engine.start("slow", json!(null)).await.unwrap();
    let err = engine.get_result(&id).await.unwrap_err();

    assert!(matches!(err, DurableError::TimedOut(_)));
    assert!(started.elapsed() >= Duration::from_secs(120));
    assert!(started.elapsed() < Duration::from_secs(86_400));

    let history = engine.history(&id).await.unwrap();
    assert_eq!(
        history.terminal_event().unwrap().event_type(),
        EventType::WorkflowTimedOut
    );
    assert!(history.events_of_type(EventType::TimerFired).is_empty());
    assert_eq!(
        engine.describe(&id).await.unwrap().status,
        ExecutionStatus::TimedOut
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_option_overrides_workflow_timeout() {
    let engine = engine(MockActivityExecutor::new());
    let started = Instant::now();

    let id = engine
        .start_with_options(
            "slow",
            json!(null),
            StartWorkflowOptions::new().with_execution_timeout(Duration::from_secs(30)),
        )
        .await
        .unwrap();

    assert!(matches!(
        engine.get_result(&id).await,
        Err(DurableError::TimedOut(_))
    ));
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(started.elapsed() < Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn test_config_default_timeout() {
    let config = EngineConfig::default().with_default_execution_timeout(Duration::from_secs(45));
    let engine = engine_builder(Arc::new(InMemoryHistoryStore::new()), MockActivityExecutor::new())
        .config(config)
        .build()
        .unwrap();

    // "approval" declares no timeout of its own and waits for a signal forever
    let id = engine.start("approval", json!(null)).await.unwrap();
    assert!(matches!(
        engine.get_result(&id).await,
        Err(DurableError::TimedOut(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_finished_execution_ignores_timeout() {
    let engine = engine(MockActivityExecutor::new().with_result("ssn-trace", json!("pass")));
    let id = engine
        .start_with_options(
            "background-check",
            "555-55-5555",
            StartWorkflowOptions::new().with_execution_timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap();
    assert_eq!(engine.get_result(&id).await.unwrap(), json!("pass"));

    tokio::time::sleep(Duration::from_secs(10)).await;
    let history = engine.history(&id).await.unwrap();
    assert_eq!(
        history.terminal_event().unwrap().event_type(),
        EventType::WorkflowCompleted
    );
}
