//! WorkflowContext trait definition

use crate::error::{DurableError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use durable_core::{ActivityOptions, DeterministicRandom, ExecutionId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// A signal consumed by workflow code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedSignal {
    pub name: String,
    pub payload: Value,
}

impl ReceivedSignal {
    /// Deserialize the payload
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(DurableError::Serialization)
    }
}

/// Context for workflow execution providing deterministic APIs.
///
/// Every value workflow code observes through the context comes from the
/// execution's history, so a re-run against the same history sees the same
/// values. Blocking calls return `DurableError::Suspended` when their
/// result is not yet recorded; workflow code must propagate it with `?`.
///
/// This trait uses `Value` types for object-safety. For typed APIs, use the
/// extension methods provided by `WorkflowContextExt`.
#[async_trait]
pub trait WorkflowContext: Send + Sync {
    // === Identifiers ===

    /// Get the workflow id of this execution
    fn workflow_id(&self) -> &str;

    /// Get the run id of this execution
    fn run_id(&self) -> Uuid;

    fn execution_id(&self) -> &ExecutionId;

    /// Get the registered workflow type
    fn workflow_type(&self) -> &str;

    /// Get the raw workflow input as JSON Value
    fn input_raw(&self) -> &Value;

    // === Deterministic APIs ===

    /// Timestamp of the most recent event the code has consumed (same on replay)
    fn current_time(&self) -> DateTime<Utc>;

    /// Get the current time in milliseconds (same on replay)
    fn current_time_millis(&self) -> i64 {
        self.current_time().timestamp_millis()
    }

    /// Generate a deterministic UUID (same on replay)
    fn random_uuid(&self) -> Uuid;

    /// Get a deterministic random number generator (same sequence on replay)
    fn random(&self) -> &dyn DeterministicRandom;

    /// Whether the code is re-executing decisions already recorded in history
    fn is_replaying(&self) -> bool;

    // === Activities ===

    /// Schedule an activity and wait for its result (raw Value version).
    ///
    /// Options without any timeout are rejected with
    /// `InvalidConfiguration` before anything is recorded.
    async fn execute_activity_raw(
        &self,
        activity_type: &str,
        input: Value,
        options: ActivityOptions,
    ) -> Result<Value>;

    // === Timers ===

    /// Durable sleep
    async fn sleep(&self, duration: Duration) -> Result<()>;

    // === Signals ===

    /// Wait for the next signal with this name (raw Value version)
    async fn wait_for_signal_raw(&self, name: &str) -> Result<Value>;

    /// Wait for the next signal of any name, in arrival order
    async fn next_signal(&self) -> Result<ReceivedSignal>;

    // === Queries ===

    /// Publish a value answered by queries with this name (raw Value version).
    /// Never recorded in history.
    fn set_query_state_raw(&self, name: &str, value: Value);

    // === Cancellation ===

    /// Check if cancellation has been requested for this execution
    fn is_cancellation_requested(&self) -> bool;

    /// Return `Cancelled` if cancellation has been requested
    fn check_cancellation(&self) -> Result<()>;
}

/// Extension trait for typed workflow context operations.
/// These methods provide type-safe wrappers around the raw Value methods.
pub trait WorkflowContextExt: WorkflowContext {
    /// Get the workflow input as the specified type
    fn input<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.input_raw().clone()).map_err(DurableError::Serialization)
    }

    /// Schedule an activity with typed input and output
    fn execute_activity<I, O>(
        &self,
        activity_type: &str,
        input: I,
        options: ActivityOptions,
    ) -> impl Future<Output = Result<O>> + Send
    where
        Self: Sync,
        I: Serialize + Send,
        O: DeserializeOwned,
    {
        async move {
            let input = serde_json::to_value(input).map_err(DurableError::Serialization)?;
            let output = self
                .execute_activity_raw(activity_type, input, options)
                .await?;
            serde_json::from_value(output).map_err(DurableError::Serialization)
        }
    }

    /// Wait for a signal and deserialize its payload
    fn wait_for_signal<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<T>> + Send
    where
        Self: Sync,
    {
        async move {
            let payload = self.wait_for_signal_raw(name).await?;
            serde_json::from_value(payload).map_err(DurableError::Serialization)
        }
    }

    /// Publish a typed query value
    fn set_query_state<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(DurableError::Serialization)?;
        self.set_query_state_raw(name, value);
        Ok(())
    }
}

// Implement WorkflowContextExt for all types that implement WorkflowContext
impl<T: WorkflowContext + ?Sized> WorkflowContextExt for T {}
