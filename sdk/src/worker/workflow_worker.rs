//! ExecutionActor - The task that owns one live execution
//!
//! Each execution runs as one tokio task holding its [`EventBridge`] and
//! driving its code through the [`WorkflowScheduler`]. Everything that
//! happens to the execution arrives through its mailbox: activity outcomes
//! from the gateway, fired timers, signals and cancellation from the client.
//! The task is the only writer of the execution's history.

use crate::activity::gateway::ActivityGateway;
use crate::client::hook::WorkflowHook;
use crate::error::{DurableError, FailureType, Result};
use crate::worker::registry::RegisteredWorkflow;
use crate::worker::scheduler::{SchedulerState, WorkflowScheduler};
use crate::worker::timer::{Clock, TimerService};
use crate::workflow::bridge::{Dispatch, EventBridge, InboundEvent};
use chrono::Duration as ChronoDuration;
use durable_core::{
    duration_millis, ActivityFailureCause, EventType, ExecutionId, HistoryEvent, WorkflowCommand,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Message sent to an execution's task
#[derive(Debug)]
pub enum ExecutionMessage {
    /// Record an event; `ack` reports once it is durably appended
    Deliver {
        event: InboundEvent,
        ack: Option<oneshot::Sender<Result<()>>>,
    },
    /// Stop the task without closing the history
    Shutdown,
}

impl From<InboundEvent> for ExecutionMessage {
    fn from(event: InboundEvent) -> Self {
        Self::Deliver { event, ack: None }
    }
}

/// How an execution ended
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed(Value),
    Failed {
        error: String,
        failure_type: FailureType,
    },
    Cancelled(String),
    TimedOut,
}

impl ExecutionOutcome {
    /// Read the outcome recorded by a terminal event
    pub fn from_terminal_event(event: &HistoryEvent) -> Option<Self> {
        let outcome = match event.event_type() {
            EventType::WorkflowCompleted => {
                Self::Completed(event.get("output").cloned().unwrap_or(Value::Null))
            }
            EventType::WorkflowFailed => Self::Failed {
                error: event.get_string("error").unwrap_or_default().to_string(),
                failure_type: FailureType::parse(
                    event.get_string("failureType").unwrap_or_default(),
                ),
            },
            EventType::WorkflowCancelled => {
                Self::Cancelled(event.get_string("reason").unwrap_or_default().to_string())
            }
            EventType::WorkflowTimedOut => Self::TimedOut,
            _ => return None,
        };
        Some(outcome)
    }

    /// Convert into the result a client waiting on the execution sees
    pub fn into_result(self) -> Result<Value> {
        match self {
            Self::Completed(output) => Ok(output),
            Self::Failed {
                error,
                failure_type,
            } => Err(DurableError::WorkflowFailed {
                message: error,
                failure_type,
            }),
            Self::Cancelled(reason) => Err(DurableError::Cancelled(reason)),
            Self::TimedOut => Err(DurableError::TimedOut(
                "execution exceeded its timeout".to_string(),
            )),
        }
    }
}

/// Query values published by an execution's code
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshot {
    values: BTreeMap<String, Value>,
    closed_at: Option<Instant>,
}

impl QuerySnapshot {
    /// Value published under `name`
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Check if the execution finished more than `retention` ago
    pub fn is_expired(&self, retention: Duration) -> bool {
        self.closed_at
            .is_some_and(|closed| closed.elapsed() >= retention)
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// Shared services every execution task uses
pub struct ExecutionServices {
    pub scheduler: WorkflowScheduler,
    pub gateway: Arc<ActivityGateway>,
    pub hook: Arc<dyn WorkflowHook>,
    pub clock: Arc<dyn Clock>,
    pub mailbox_size: usize,
}

impl std::fmt::Debug for ExecutionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionServices")
            .field("scheduler", &self.scheduler)
            .field("gateway", &self.gateway)
            .field("mailbox_size", &self.mailbox_size)
            .finish()
    }
}

/// Client-side handle to a running execution task
pub struct ExecutionHandle {
    execution_id: ExecutionId,
    workflow_type: String,
    cancellable: bool,
    sender: mpsc::Sender<ExecutionMessage>,
    outcome: watch::Receiver<Option<ExecutionOutcome>>,
    snapshot: Arc<RwLock<QuerySnapshot>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionHandle {
    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    pub fn workflow_type(&self) -> &str {
        &self.workflow_type
    }

    /// Whether the workflow observes cancellation requests
    pub fn is_cancellable(&self) -> bool {
        self.cancellable
    }

    /// Outcome, if the execution has finished
    pub fn outcome(&self) -> Option<ExecutionOutcome> {
        self.outcome.borrow().clone()
    }

    /// Wait until the execution finishes
    pub async fn wait_for_outcome(&self) -> Result<ExecutionOutcome> {
        let mut outcome = self.outcome.clone();
        let finished = outcome
            .wait_for(|o| o.is_some())
            .await
            .map_err(|_| DurableError::NotRunning(self.execution_id.to_string()))?;
        (*finished)
            .clone()
            .ok_or_else(|| DurableError::NotRunning(self.execution_id.to_string()))
    }

    /// Record an event and wait until it is appended
    pub async fn deliver(&self, event: InboundEvent) -> Result<()> {
        let (ack, recorded) = oneshot::channel();
        self.sender
            .send(ExecutionMessage::Deliver {
                event,
                ack: Some(ack),
            })
            .await
            .map_err(|_| DurableError::NotRunning(self.execution_id.to_string()))?;
        recorded
            .await
            .map_err(|_| DurableError::NotRunning(self.execution_id.to_string()))?
    }

    /// Snapshot of the published query values
    pub fn snapshot(&self) -> QuerySnapshot {
        self.snapshot.read().clone()
    }

    /// Check if the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.lock().as_ref().is_none_or(|task| task.is_finished())
    }

    /// Stop the task and wait for it to exit
    pub async fn shutdown(&self) {
        let _ = self.sender.send(ExecutionMessage::Shutdown).await;
        let Some(task) = self.task.lock().take() else {
            return;
        };
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                warn!(execution_id = %self.execution_id, error = %e, "Execution task panicked");
            }
        }
    }
}

impl std::fmt::Debug for ExecutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("execution_id", &self.execution_id)
            .field("workflow_type", &self.workflow_type)
            .field("finished", &self.outcome.borrow().is_some())
            .finish()
    }
}

/// Task owning one execution's bridge and code
pub struct ExecutionActor {
    workflow: Arc<RegisteredWorkflow>,
    services: Arc<ExecutionServices>,
    bridge: EventBridge,
    timers: TimerService,
    mailbox: mpsc::Receiver<ExecutionMessage>,
    // Weak so the task exits once every client handle is gone
    self_sender: mpsc::WeakSender<ExecutionMessage>,
    state: SchedulerState,
    // Set once the history can no longer be written by this task
    stopped: bool,
    deadline: Option<(Instant, Duration)>,
    snapshot: Arc<RwLock<QuerySnapshot>>,
    outcome: watch::Sender<Option<ExecutionOutcome>>,
}

impl ExecutionActor {
    /// Spawn the task for an execution whose history is already started.
    ///
    /// Work outstanding in the history (activities without an outcome,
    /// timers that have not fired) is dispatched again before the first
    /// drive, so a recovered execution continues where it stopped.
    pub fn spawn(
        workflow: Arc<RegisteredWorkflow>,
        bridge: EventBridge,
        services: Arc<ExecutionServices>,
        execution_timeout: Option<Duration>,
    ) -> ExecutionHandle {
        let (sender, mailbox) = mpsc::channel(services.mailbox_size.max(1));
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let snapshot = Arc::new(RwLock::new(QuerySnapshot::default()));
        let execution_id = bridge.history().execution_id().clone();

        let deadline = execution_timeout.and_then(|timeout| {
            let start = bridge.history().execution().start_time;
            let fire_at = start + ChronoDuration::from_std(timeout).ok()?;
            Some((services.clock.instant_for(fire_at), timeout))
        });

        let actor = Self {
            workflow: Arc::clone(&workflow),
            timers: TimerService::new(Arc::clone(&services.clock)),
            services,
            bridge,
            mailbox,
            self_sender: sender.downgrade(),
            state: SchedulerState::NotStarted,
            stopped: false,
            deadline,
            snapshot: Arc::clone(&snapshot),
            outcome: outcome_tx,
        };
        let task = tokio::spawn(actor.run());

        ExecutionHandle {
            execution_id,
            workflow_type: workflow.metadata.kind.clone(),
            cancellable: workflow.metadata.cancellable,
            sender,
            outcome: outcome_rx,
            snapshot,
            task: Mutex::new(Some(task)),
        }
    }

    fn execution_id(&self) -> &ExecutionId {
        self.bridge.history().execution_id()
    }

    async fn run(mut self) {
        if self.bridge.is_closed() {
            self.finalize().await;
            return;
        }

        self.redispatch_outstanding();
        if let Err(e) = self.drive().await {
            error!(execution_id = %self.execution_id(), error = %e, "Initial drive failed");
            self.stop_if_stale(&e);
        }

        while !self.state.is_terminal() && !self.stopped {
            let deadline = self.deadline.map(|(at, _)| at);
            tokio::select! {
                message = self.mailbox.recv() => match message {
                    Some(ExecutionMessage::Deliver { event, ack }) => {
                        let result = self.handle_event(event).await;
                        if let Err(e) = &result {
                            error!(execution_id = %self.execution_id(), error = %e, "Failed to handle event");
                            self.stop_if_stale(e);
                            // An activity or timer result that was not recorded never comes back
                            if ack.is_none() && !self.stopped && matches!(e, DurableError::Store(_)) {
                                if let Err(e) = self.fail(e.to_string(), FailureType::Unknown).await {
                                    error!(execution_id = %self.execution_id(), error = %e, "Failed to record failure");
                                }
                            }
                        }
                        if let Some(ack) = ack {
                            let _ = ack.send(result);
                        }
                    }
                    Some(ExecutionMessage::Shutdown) | None => {
                        debug!(execution_id = %self.execution_id(), "Execution task stopping");
                        break;
                    }
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    if let Err(e) = self.time_out().await {
                        error!(execution_id = %self.execution_id(), error = %e, "Failed to record timeout");
                        break;
                    }
                }
            }
        }

        self.timers.cancel_all();
        if !self.state.is_terminal() {
            // Outstanding calls are dispatched again on recovery
            self.services.gateway.abort_execution(self.execution_id());
        }
    }

    /// Stop the task when another writer has taken over the history
    fn stop_if_stale(&mut self, error: &DurableError) {
        if error.is_stale_writer() {
            warn!(
                execution_id = %self.execution_id(),
                error = %error,
                "History was written by another task, stopping"
            );
            self.stopped = true;
        }
    }

    fn redispatch_outstanding(&self) {
        let Some(reply) = self.self_sender.upgrade() else {
            return;
        };
        for activity in self.bridge.outstanding_activities() {
            info!(
                execution_id = %self.execution_id(),
                activity_type = %activity.activity_type,
                correlation_token = activity.correlation_token,
                attempt = activity.attempt,
                "Re-dispatching outstanding activity"
            );
            self.services
                .gateway
                .dispatch(self.execution_id().clone(), activity, reply.clone());
        }
        for timer in self.bridge.outstanding_timers() {
            debug!(execution_id = %self.execution_id(), timer_id = %timer.timer_id, "Restoring timer");
            self.timers.schedule(timer, reply.clone());
        }
    }

    /// Record an inbound event and resume the code if it was waiting on it
    async fn handle_event(&mut self, inbound: InboundEvent) -> Result<()> {
        if let InboundEvent::TimerFired { timer_id } = &inbound {
            self.timers.fired(timer_id);
        }
        let cancellation = matches!(inbound, InboundEvent::CancellationRequested { .. });

        let Some(event) = self.bridge.deliver(inbound).await? else {
            return Err(DurableError::NotRunning(self.execution_id().to_string()));
        };
        self.notify(&event).await;

        if cancellation {
            self.cancel_activities().await?;
        }

        let resumes = self
            .state
            .awaiting()
            .is_some_and(|awaiting| awaiting.is_resumed_by(event.event_type(), event.data()));
        if resumes {
            self.drive().await?;
        } else {
            debug!(
                execution_id = %self.execution_id(),
                sequence = event.sequence_number(),
                event_type = %event.event_type(),
                "Event recorded for a later drive"
            );
        }
        Ok(())
    }

    /// Abort in-flight calls and record them as cancelled
    async fn cancel_activities(&mut self) -> Result<()> {
        let aborted = self.services.gateway.abort_execution(self.execution_id());
        for activity in self.bridge.outstanding_activities() {
            if !aborted.contains(&activity.correlation_token) {
                continue;
            }
            let cancelled = InboundEvent::ActivityFailed {
                correlation_token: activity.correlation_token,
                activity_type: activity.activity_type,
                error: "activity cancelled".to_string(),
                error_type: None,
                cause: ActivityFailureCause::Cancelled,
                attempt: activity.attempt,
            };
            if let Some(event) = self.bridge.deliver(cancelled).await? {
                self.notify(&event).await;
            }
        }
        Ok(())
    }

    /// Run the code against the history and act on the new commands
    async fn drive(&mut self) -> Result<()> {
        self.state = SchedulerState::Runnable;
        let drive = self
            .services
            .scheduler
            .drive(&self.workflow, self.bridge.history())
            .await;

        let result = match drive {
            Ok(result) => result,
            Err(DurableError::NonDeterminism(violation)) => {
                error!(
                    execution_id = %self.execution_id(),
                    sequence = violation.sequence(),
                    error = %violation,
                    "Non-determinism detected, failing execution"
                );
                return self
                    .fail(violation.to_string(), FailureType::NonDeterminism)
                    .await;
            }
            Err(e) => {
                error!(execution_id = %self.execution_id(), error = %e, "Drive failed");
                return self.fail(e.to_string(), FailureType::Unknown).await;
            }
        };

        self.snapshot.write().values = result.query_state;
        let dispatches = match self.bridge.apply_commands(&result.new_commands).await {
            Ok(dispatches) => dispatches,
            Err(e) if e.is_stale_writer() => return Err(e),
            Err(e) => {
                error!(execution_id = %self.execution_id(), error = %e, "Failed to record commands, failing execution");
                return self.fail(e.to_string(), FailureType::Unknown).await;
            }
        };
        self.state = result.state;
        self.dispatch(dispatches).await;

        if self.state.is_terminal() {
            self.finalize().await;
        }
        Ok(())
    }

    async fn dispatch(&self, dispatches: Vec<Dispatch>) {
        let Some(reply) = self.self_sender.upgrade() else {
            return;
        };
        for dispatch in dispatches {
            match dispatch {
                Dispatch::Activity(activity) => {
                    self.services
                        .hook
                        .on_activity_scheduled(
                            self.execution_id(),
                            activity.correlation_token,
                            &activity.activity_type,
                            &activity.input,
                        )
                        .await;
                    self.services
                        .gateway
                        .dispatch(self.execution_id().clone(), activity, reply.clone());
                }
                Dispatch::Timer(timer) => self.timers.schedule(timer, reply.clone()),
            }
        }
    }

    async fn fail(&mut self, error: String, failure_type: FailureType) -> Result<()> {
        let command = WorkflowCommand::FailExecution {
            error,
            failure_type: failure_type.as_str().to_string(),
        };
        if let Err(e) = self.bridge.apply_commands(&[command]).await {
            // Nothing more can be recorded; recovery resumes from the store
            self.stopped = true;
            return Err(e);
        }
        self.state = SchedulerState::Failed;
        self.finalize().await;
        Ok(())
    }

    async fn time_out(&mut self) -> Result<()> {
        let timeout_ms = self
            .deadline
            .map(|(_, timeout)| duration_millis(timeout))
            .unwrap_or_default();
        warn!(execution_id = %self.execution_id(), timeout_ms, "Execution timed out");

        self.bridge
            .deliver(InboundEvent::TimedOut { timeout_ms })
            .await?;
        self.state = SchedulerState::TimedOut;
        self.finalize().await;
        Ok(())
    }

    /// Publish the recorded outcome and release live resources
    async fn finalize(&mut self) {
        self.timers.cancel_all();
        self.services.gateway.abort_execution(self.execution_id());
        self.snapshot.write().closed_at = Some(Instant::now());

        let Some(outcome) = self
            .bridge
            .history()
            .terminal_event()
            .and_then(ExecutionOutcome::from_terminal_event)
        else {
            return;
        };
        self.state = match &outcome {
            ExecutionOutcome::Completed(_) => SchedulerState::Completed,
            ExecutionOutcome::Failed { .. } => SchedulerState::Failed,
            ExecutionOutcome::Cancelled(_) => SchedulerState::Cancelled,
            ExecutionOutcome::TimedOut => SchedulerState::TimedOut,
        };

        let id = self.bridge.history().execution_id().clone();
        let workflow_type = self.workflow.metadata.kind.as_str();
        let hook = &self.services.hook;
        match &outcome {
            ExecutionOutcome::Completed(output) => {
                info!(execution_id = %id, "Execution completed");
                hook.on_workflow_completed(&id, workflow_type, output).await;
            }
            ExecutionOutcome::Failed { error, .. } => {
                hook.on_workflow_failed(&id, workflow_type, error).await;
            }
            ExecutionOutcome::Cancelled(reason) => {
                info!(execution_id = %id, reason = %reason, "Execution cancelled");
                hook.on_workflow_cancelled(&id, workflow_type, reason).await;
            }
            ExecutionOutcome::TimedOut => {
                hook.on_workflow_failed(&id, workflow_type, "execution timed out")
                    .await;
            }
        }
        self.outcome.send_replace(Some(outcome));
    }

    async fn notify(&self, event: &HistoryEvent) {
        let id = self.execution_id();
        let hook = &self.services.hook;
        let token = event.correlation_token().unwrap_or_default();
        let activity_type = event.get_string("activityType").unwrap_or_default();
        match event.event_type() {
            EventType::SignalReceived => {
                hook.on_signal_received(
                    id,
                    event.get_string("signalName").unwrap_or_default(),
                    event.get("payload").unwrap_or(&Value::Null),
                )
                .await
            }
            EventType::ActivityCompleted => {
                hook.on_activity_completed(
                    id,
                    token,
                    activity_type,
                    event.get("result").unwrap_or(&Value::Null),
                )
                .await
            }
            EventType::ActivityFailed => {
                hook.on_activity_failed(
                    id,
                    token,
                    activity_type,
                    event.get_string("error").unwrap_or_default(),
                )
                .await
            }
            _ => {}
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
