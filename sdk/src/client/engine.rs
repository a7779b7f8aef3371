//! DurableEngine - Client-facing entry point for starting and driving executions

use crate::client::builder::DurableEngineBuilder;
use crate::config::EngineConfig;
use crate::error::{DurableError, Result};
use crate::worker::registry::WorkflowRegistry;
use crate::worker::replayer::WorkflowReplayer;
use crate::worker::workflow_worker::{ExecutionActor, ExecutionHandle, ExecutionOutcome, ExecutionServices};
use crate::workflow::bridge::{EventBridge, InboundEvent};
use durable_core::{
    EventType, ExecutionId, ExecutionInfo, ExecutionStatus, History, HistoryEvent, HistoryStore,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Options for starting a workflow execution
#[derive(Debug, Clone, Default)]
pub struct StartWorkflowOptions {
    /// Workflow id to use instead of a generated one
    pub workflow_id: Option<String>,
    /// Execution timeout, overriding the workflow's declared timeout
    pub execution_timeout: Option<Duration>,
}

impl StartWorkflowOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the workflow id
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    /// Set the execution timeout
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }
}

/// Runs workflow executions against a history store.
///
/// Each started or recovered execution is owned by its own task; the engine
/// keeps a handle per execution to route signals, queries and cancellation.
///
/// Example:
/// ```ignore
/// let engine = DurableEngine::builder()
///     .register_workflow(BackgroundCheck)
///     .register_activity(SsnTrace)
///     .build()?;
///
/// let id = engine.start("background-check", "555-55-5555").await?;
/// let outcome: String = engine.get_result_as(&id).await?;
/// ```
pub struct DurableEngine {
    config: EngineConfig,
    store: Arc<dyn HistoryStore>,
    workflows: Arc<WorkflowRegistry>,
    services: Arc<ExecutionServices>,
    executions: RwLock<HashMap<ExecutionId, Arc<ExecutionHandle>>>,
}

impl DurableEngine {
    pub(crate) fn new(
        config: EngineConfig,
        store: Arc<dyn HistoryStore>,
        workflows: Arc<WorkflowRegistry>,
        services: Arc<ExecutionServices>,
    ) -> Self {
        Self {
            config,
            store,
            workflows,
            services,
            executions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a builder
    pub fn builder() -> DurableEngineBuilder {
        DurableEngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Check if a workflow type is registered
    pub fn has_workflow(&self, workflow_type: &str) -> bool {
        self.workflows.has(workflow_type)
    }

    /// Number of executions with a live task
    pub fn running_count(&self) -> usize {
        self.executions
            .read()
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Start an execution with a generated workflow id
    pub async fn start(&self, workflow_type: &str, input: impl Serialize) -> Result<ExecutionId> {
        self.start_with_options(workflow_type, input, StartWorkflowOptions::new())
            .await
    }

    /// Start an execution
    pub async fn start_with_options(
        &self,
        workflow_type: &str,
        input: impl Serialize,
        options: StartWorkflowOptions,
    ) -> Result<ExecutionId> {
        let workflow = self.workflows.require(workflow_type)?;
        let input = serde_json::to_value(input)?;

        let workflow_id = options
            .workflow_id
            .unwrap_or_else(|| format!("{}-{}", workflow_type, Uuid::new_v4()));
        let execution_id = ExecutionId::generate(workflow_id);
        let now = self.services.clock.now();

        let info = ExecutionInfo::new(execution_id.clone(), workflow_type, input.clone(), now);
        self.store.create(info).await?;
        self.store
            .append(
                &execution_id,
                HistoryEvent::unsequenced(
                    EventType::WorkflowStarted,
                    json!({
                        "workflowType": workflow_type,
                        "workflowId": execution_id.workflow_id,
                        "runId": execution_id.run_id,
                        "input": input,
                    }),
                    now,
                ),
            )
            .await?;

        info!(
            workflow_id = %execution_id,
            workflow_type = %workflow_type,
            "Starting workflow execution"
        );
        self.services
            .hook
            .on_workflow_started(&execution_id, workflow_type, &input)
            .await;

        let timeout = options.execution_timeout.or_else(|| {
            workflow
                .metadata
                .timeout_seconds
                .map(Duration::from_secs)
                .or(self.config.default_execution_timeout)
        });
        let history = self.store.read(&execution_id).await?;
        self.spawn(workflow_type, history, timeout)?;

        Ok(execution_id)
    }

    /// Spawn a task for `history` unless this engine already runs one.
    ///
    /// The liveness check and the insert happen under one lock, so
    /// concurrent callers start at most one task. Returns whether a task
    /// was spawned.
    fn spawn(&self, workflow_type: &str, history: History, timeout: Option<Duration>) -> Result<bool> {
        let workflow = self.workflows.require(workflow_type)?;
        let execution_id = history.execution_id().clone();

        let mut executions = self.executions.write();
        if executions
            .get(&execution_id)
            .is_some_and(|handle| !handle.is_finished())
        {
            return Ok(false);
        }
        let bridge = EventBridge::live(
            Arc::clone(&self.store),
            history,
            Arc::clone(&self.services.clock),
        );
        let handle = ExecutionActor::spawn(workflow, bridge, Arc::clone(&self.services), timeout);
        executions.insert(execution_id, Arc::new(handle));
        Ok(true)
    }

    /// Handle of a live execution, or the error explaining why there is none
    async fn live_handle(&self, id: &ExecutionId) -> Result<Arc<ExecutionHandle>> {
        let handle = self.executions.read().get(id).cloned();
        match handle {
            Some(handle) if !handle.is_finished() => Ok(handle),
            _ => {
                // Distinguishes unknown executions from ones with no live task
                let info = self.store.describe(id).await?;
                Err(DurableError::NotRunning(format!("{} ({})", id, info.status)))
            }
        }
    }

    /// Send a signal to a running execution.
    ///
    /// Returns once the signal is recorded in history.
    pub async fn signal(&self, id: &ExecutionId, name: &str, payload: impl Serialize) -> Result<()> {
        let payload = serde_json::to_value(payload)?;
        let handle = self.live_handle(id).await?;
        debug!(workflow_id = %id, signal = %name, "Delivering signal");
        handle
            .deliver(InboundEvent::SignalReceived {
                name: name.to_string(),
                payload,
            })
            .await
    }

    /// Request cancellation of a running execution
    pub async fn cancel(&self, id: &ExecutionId, reason: &str) -> Result<()> {
        let handle = self.live_handle(id).await?;
        if !handle.is_cancellable() {
            return Err(DurableError::InvalidConfiguration(format!(
                "Workflow '{}' is not cancellable",
                handle.workflow_type()
            )));
        }
        info!(workflow_id = %id, reason = %reason, "Requesting cancellation");
        handle
            .deliver(InboundEvent::CancellationRequested {
                reason: reason.to_string(),
            })
            .await
    }

    /// Read a query value from the execution's last published snapshot.
    ///
    /// Never drives the workflow or records anything.
    pub async fn query(&self, id: &ExecutionId, name: &str) -> Result<Value> {
        let handle = self.executions.read().get(id).cloned();
        let Some(handle) = handle else {
            let info = self.store.describe(id).await?;
            return Err(DurableError::NotRunning(format!("{} ({})", id, info.status)));
        };

        let snapshot = handle.snapshot();
        if snapshot.is_expired(self.config.snapshot_retention) {
            debug!(workflow_id = %id, "Query snapshot expired, releasing execution");
            self.executions.write().remove(id);
            return Err(DurableError::NotRunning(id.to_string()));
        }

        snapshot
            .get(name)
            .cloned()
            .ok_or_else(|| DurableError::QueryNotFound(format!("{} on {}", name, id)))
    }

    /// Typed variant of [`query`](Self::query)
    pub async fn query_as<T: DeserializeOwned>(&self, id: &ExecutionId, name: &str) -> Result<T> {
        let value = self.query(id, name).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Wait for the execution to finish and return its output.
    ///
    /// Returns immediately for an execution whose history is already closed.
    pub async fn get_result(&self, id: &ExecutionId) -> Result<Value> {
        let handle = self.executions.read().get(id).cloned();
        if let Some(handle) = handle {
            if let Some(outcome) = handle.outcome() {
                return outcome.into_result();
            }
            if !handle.is_finished() {
                match handle.wait_for_outcome().await {
                    Ok(outcome) => return outcome.into_result(),
                    // Stopped without an outcome; answer from the store
                    Err(e) => debug!(workflow_id = %id, error = %e, "Execution task ended early"),
                }
            }
        }

        let history = self.store.read(id).await?;
        match history
            .terminal_event()
            .and_then(ExecutionOutcome::from_terminal_event)
        {
            Some(outcome) => outcome.into_result(),
            None => Err(DurableError::NotRunning(format!(
                "{} has no live task; recover it to continue",
                id
            ))),
        }
    }

    /// Typed variant of [`get_result`](Self::get_result)
    pub async fn get_result_as<T: DeserializeOwned>(&self, id: &ExecutionId) -> Result<T> {
        let value = self.get_result(id).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Describe an execution
    pub async fn describe(&self, id: &ExecutionId) -> Result<ExecutionInfo> {
        Ok(self.store.describe(id).await?)
    }

    /// Full recorded history of an execution
    pub async fn history(&self, id: &ExecutionId) -> Result<History> {
        Ok(self.store.read(id).await?)
    }

    /// List executions, optionally restricted to one status
    pub async fn list(&self, status: Option<ExecutionStatus>) -> Result<Vec<ExecutionInfo>> {
        Ok(self.store.list(status).await?)
    }

    /// Drop the in-memory state of an execution.
    ///
    /// A running execution's task is stopped without closing its history; it
    /// can be resumed later with [`recover`](Self::recover).
    pub async fn release(&self, id: &ExecutionId) -> Result<()> {
        let handle = self.executions.write().remove(id);
        let Some(handle) = handle else {
            self.store.describe(id).await?;
            return Ok(());
        };
        debug!(workflow_id = %id, "Releasing execution");
        handle.shutdown().await;
        Ok(())
    }

    /// Resume an execution from its stored history.
    ///
    /// Activities and timers still outstanding in the history are dispatched
    /// again. Closed executions and executions already live are left alone.
    pub async fn recover(&self, id: &ExecutionId) -> Result<()> {
        let live = self
            .executions
            .read()
            .get(id)
            .is_some_and(|handle| !handle.is_finished());
        if live {
            return Ok(());
        }

        let history = self.store.read(id).await?;
        if history.is_terminal() {
            debug!(workflow_id = %id, "Execution already closed, nothing to recover");
            return Ok(());
        }

        let workflow_type = history.execution().workflow_type.clone();
        let workflow = self.workflows.require(&workflow_type)?;
        let timeout = workflow
            .metadata
            .timeout_seconds
            .map(Duration::from_secs)
            .or(self.config.default_execution_timeout);

        info!(
            workflow_id = %id,
            workflow_type = %workflow_type,
            events = history.len(),
            "Recovering execution"
        );
        if !self.spawn(&workflow_type, history, timeout)? {
            debug!(workflow_id = %id, "Execution recovered concurrently");
        }
        Ok(())
    }

    /// Recover every execution the store reports as running
    pub async fn recover_all(&self) -> Result<Vec<ExecutionId>> {
        let mut recovered = Vec::new();
        for info in self.store.list_running().await? {
            let id = info.execution_id;
            match self.recover(&id).await {
                Ok(()) => recovered.push(id),
                Err(e) => warn!(workflow_id = %id, error = %e, "Failed to recover execution"),
            }
        }
        Ok(recovered)
    }

    /// Replayer sharing this engine's workflow registry
    pub fn replayer(&self) -> WorkflowReplayer {
        WorkflowReplayer::new(
            Arc::clone(&self.workflows),
            self.config.enable_determinism_validation,
        )
    }

    /// Stop every execution task. Histories stay open for recovery.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.executions.write().drain().map(|(_, h)| h).collect();
        info!(executions = handles.len(), "Shutting down engine");
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

impl std::fmt::Debug for DurableEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableEngine")
            .field("config", &self.config)
            .field("workflows", &self.workflows.get_registered_kinds())
            .field("executions", &self.executions.read().len())
            .finish()
    }
}
