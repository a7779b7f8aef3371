//! Workflow lifecycle hooks for observability
//!
//! Hooks receive notifications about execution lifecycle events and can be
//! used for logging, metrics, monitoring, etc. They are called from the
//! execution's task, after the corresponding event is recorded, and only for
//! live progress: recovering an execution does not replay its notifications.

use async_trait::async_trait;
use durable_core::ExecutionId;
use serde_json::Value;

/// Hook trait for observing workflow lifecycle events
///
/// Implementations are registered with
/// [`DurableEngineBuilder::register_hook`](crate::client::DurableEngineBuilder::register_hook).
#[async_trait]
pub trait WorkflowHook: Send + Sync {
    /// Called when an execution starts
    async fn on_workflow_started(
        &self,
        _execution_id: &ExecutionId,
        _workflow_type: &str,
        _input: &Value,
    ) {
    }

    /// Called when an execution completes successfully
    async fn on_workflow_completed(
        &self,
        _execution_id: &ExecutionId,
        _workflow_type: &str,
        _output: &Value,
    ) {
    }

    /// Called when an execution fails or times out
    async fn on_workflow_failed(&self, _execution_id: &ExecutionId, _workflow_type: &str, _error: &str) {
    }

    /// Called when an execution ends after observing cancellation
    async fn on_workflow_cancelled(
        &self,
        _execution_id: &ExecutionId,
        _workflow_type: &str,
        _reason: &str,
    ) {
    }

    /// Called when workflow code schedules an activity
    async fn on_activity_scheduled(
        &self,
        _execution_id: &ExecutionId,
        _correlation_token: u32,
        _activity_type: &str,
        _input: &Value,
    ) {
    }

    /// Called when an activity call completes
    async fn on_activity_completed(
        &self,
        _execution_id: &ExecutionId,
        _correlation_token: u32,
        _activity_type: &str,
        _result: &Value,
    ) {
    }

    /// Called when an activity call fails for good
    async fn on_activity_failed(
        &self,
        _execution_id: &ExecutionId,
        _correlation_token: u32,
        _activity_type: &str,
        _error: &str,
    ) {
    }

    /// Called when a signal is recorded
    async fn on_signal_received(&self, _execution_id: &ExecutionId, _name: &str, _payload: &Value) {}
}

/// Composite hook that delegates to multiple hooks, in registration order
pub struct CompositeWorkflowHook {
    hooks: Vec<Box<dyn WorkflowHook>>,
}

impl CompositeWorkflowHook {
    /// Create a new composite hook from a list of hooks
    pub fn new(hooks: Vec<Box<dyn WorkflowHook>>) -> Self {
        Self { hooks }
    }

    /// Number of hooks
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check if there are no hooks
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[async_trait]
impl WorkflowHook for CompositeWorkflowHook {
    async fn on_workflow_started(&self, execution_id: &ExecutionId, workflow_type: &str, input: &Value) {
        for hook in &self.hooks {
            hook.on_workflow_started(execution_id, workflow_type, input)
                .await;
        }
    }

    async fn on_workflow_completed(
        &self,
        execution_id: &ExecutionId,
        workflow_type: &str,
        output: &Value,
    ) {
        for hook in &self.hooks {
            hook.on_workflow_completed(execution_id, workflow_type, output)
                .await;
        }
    }

    async fn on_workflow_failed(&self, execution_id: &ExecutionId, workflow_type: &str, error: &str) {
        for hook in &self.hooks {
            hook.on_workflow_failed(execution_id, workflow_type, error)
                .await;
        }
    }

    async fn on_workflow_cancelled(
        &self,
        execution_id: &ExecutionId,
        workflow_type: &str,
        reason: &str,
    ) {
        for hook in &self.hooks {
            hook.on_workflow_cancelled(execution_id, workflow_type, reason)
                .await;
        }
    }

    async fn on_activity_scheduled(
        &self,
        execution_id: &ExecutionId,
        correlation_token: u32,
        activity_type: &str,
        input: &Value,
    ) {
        for hook in &self.hooks {
            hook.on_activity_scheduled(execution_id, correlation_token, activity_type, input)
                .await;
        }
    }

    async fn on_activity_completed(
        &self,
        execution_id: &ExecutionId,
        correlation_token: u32,
        activity_type: &str,
        result: &Value,
    ) {
        for hook in &self.hooks {
            hook.on_activity_completed(execution_id, correlation_token, activity_type, result)
                .await;
        }
    }

    async fn on_activity_failed(
        &self,
        execution_id: &ExecutionId,
        correlation_token: u32,
        activity_type: &str,
        error: &str,
    ) {
        for hook in &self.hooks {
            hook.on_activity_failed(execution_id, correlation_token, activity_type, error)
                .await;
        }
    }

    async fn on_signal_received(&self, execution_id: &ExecutionId, name: &str, payload: &Value) {
        for hook in &self.hooks {
            hook.on_signal_received(execution_id, name, payload).await;
        }
    }
}

/// A no-op hook that does nothing (useful as a default)
pub struct NoOpHook;

#[async_trait]
impl WorkflowHook for NoOpHook {}

/// A logging hook that logs lifecycle events using tracing
pub struct LoggingHook {
    level: tracing::Level,
}

impl LoggingHook {
    /// Create a new logging hook with the specified log level
    pub fn new(level: tracing::Level) -> Self {
        Self { level }
    }

    /// Create a logging hook that logs at INFO level
    pub fn info() -> Self {
        Self::new(tracing::Level::INFO)
    }

    /// Create a logging hook that logs at DEBUG level
    pub fn debug() -> Self {
        Self::new(tracing::Level::DEBUG)
    }

    fn log(&self, execution_id: &ExecutionId, workflow_type: &str, message: &str) {
        match self.level {
            tracing::Level::DEBUG | tracing::Level::TRACE => {
                tracing::debug!(
                    execution_id = %execution_id,
                    workflow_type = %workflow_type,
                    "{}", message
                );
            }
            _ => {
                tracing::info!(
                    execution_id = %execution_id,
                    workflow_type = %workflow_type,
                    "{}", message
                );
            }
        }
    }
}

impl Default for LoggingHook {
    fn default() -> Self {
        Self::info()
    }
}

#[async_trait]
impl WorkflowHook for LoggingHook {
    async fn on_workflow_started(&self, execution_id: &ExecutionId, workflow_type: &str, _input: &Value) {
        self.log(execution_id, workflow_type, "Workflow started");
    }

    async fn on_workflow_completed(
        &self,
        execution_id: &ExecutionId,
        workflow_type: &str,
        _output: &Value,
    ) {
        self.log(execution_id, workflow_type, "Workflow completed");
    }

    async fn on_workflow_failed(&self, execution_id: &ExecutionId, workflow_type: &str, error: &str) {
        tracing::error!(
            execution_id = %execution_id,
            workflow_type = %workflow_type,
            error = %error,
            "Workflow failed"
        );
    }

    async fn on_workflow_cancelled(
        &self,
        execution_id: &ExecutionId,
        workflow_type: &str,
        reason: &str,
    ) {
        tracing::warn!(
            execution_id = %execution_id,
            workflow_type = %workflow_type,
            reason = %reason,
            "Workflow cancelled"
        );
    }

    async fn on_activity_failed(
        &self,
        execution_id: &ExecutionId,
        correlation_token: u32,
        activity_type: &str,
        error: &str,
    ) {
        tracing::warn!(
            execution_id = %execution_id,
            correlation_token,
            activity_type = %activity_type,
            error = %error,
            "Activity failed"
        );
    }
}
