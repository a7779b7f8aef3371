//! Lifecycle hook tests

use crate::{engine_builder, settle};
use async_trait::async_trait;
use durable_sdk::testing::MockActivityExecutor;
use durable_sdk::{ExecutionId, InMemoryHistoryStore, LoggingHook, WorkflowHook};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// Hook that records every notification as a short string
#[derive(Clone, Default)]
struct RecordingHook {
    seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingHook {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl WorkflowHook for RecordingHook {
    async fn on_workflow_started(&self, _id: &ExecutionId, workflow_type: &str, _input: &Value) {
        self.seen.lock().push(format!("started:{}", workflow_type));
    }

    async fn on_workflow_completed(&self, _id: &ExecutionId, workflow_type: &str, _output: &Value) {
        self.seen.lock().push(format!("completed:{}", workflow_type));
    }

    async fn on_workflow_cancelled(&self, _id: &ExecutionId, workflow_type: &str, _reason: &str) {
        self.seen.lock().push(format!("cancelled:{}", workflow_type));
    }

    async fn on_activity_scheduled(
        &self,
        _id: &ExecutionId,
        correlation_token: u32,
        activity_type: &str,
        _input: &Value,
    ) {
        self.seen
            .lock()
            .push(format!("scheduled:{}#{}", activity_type, correlation_token));
    }

    async fn on_activity_completed(
        &self,
        _id: &ExecutionId,
        correlation_token: u32,
        activity_type: &str,
        _result: &Value,
    ) {
        self.seen
            .lock()
            .push(format!("activity-completed:{}#{}", activity_type, correlation_token));
    }

    async fn on_signal_received(&self, _id: &ExecutionId, name: &str, _payload: &Value) {
        self.seen.lock().push(format!("signal:{}", name));
    }
}

#[tokio::test(start_paused = true)]
async fn test_hooks_observe_live_progress() {
    let hook = RecordingHook::default();
    let engine = engine_builder(
        Arc::new(InMemoryHistoryStore::new()),
        MockActivityExecutor::new().with_result("ssn-trace", json!("pass")),
    )
    .register_hook(hook.clone())
    .register_hook(LoggingHook::debug())
    .build()
    .unwrap();

    let id = engine.start("background-check", "555-55-5555").await.unwrap();
    engine.get_result(&id).await.unwrap();
    settle().await;

    assert_eq!(
        hook.seen(),
        vec![
            "started:background-check",
            "scheduled:ssn-trace#0",
            "activity-completed:ssn-trace#0",
            "completed:background-check",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_hooks_see_signals_and_cancellation() {
    let hook = RecordingHook::default();
    let engine = engine_builder(Arc::new(InMemoryHistoryStore::new()), MockActivityExecutor::new())
        .register_hook(hook.clone())
        .build()
        .unwrap();

    let id = engine.start("work-queue", json!(null)).await.unwrap();
    engine.signal(&id, "add", "invoice-1").await.unwrap();
    engine.cancel(&id, "closing").await.unwrap();
    let _ = engine.get_result(&id).await;
    settle().await;

    assert_eq!(
        hook.seen(),
        vec!["started:work-queue", "signal:add", "cancelled:work-queue"]
    );
}
