//! WorkflowScheduler - Drives workflow code against an execution's history

use crate::error::{classify_error, DurableError, FailureType, Result};
use crate::worker::registry::RegisteredWorkflow;
use crate::workflow::context::WorkflowContext;
use crate::workflow::context_impl::WorkflowContextImpl;
use durable_core::{
    Awaiting, CommandCollector, CommandRecorder, DeterminismValidator, EventLookup, EventType,
    History, ValidatingCommandRecorder, WorkflowCommand,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// State of an execution's workflow code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    /// No `WorkflowStarted` event yet
    NotStarted,
    /// Code is executing
    Runnable,
    /// Code is blocked until the awaited event is recorded
    Suspended(Awaiting),
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl SchedulerState {
    /// Check if the code has finished for good
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    /// What the code is blocked on, if suspended
    pub fn awaiting(&self) -> Option<&Awaiting> {
        match self {
            Self::Suspended(awaiting) => Some(awaiting),
            _ => None,
        }
    }
}

/// Result of one drive of workflow code
#[derive(Debug, Clone)]
pub struct WorkflowTaskResult {
    /// State the code reached
    pub state: SchedulerState,
    /// Every command the code emitted, replayed ones included
    pub commands: Vec<WorkflowCommand>,
    /// Commands past the recorded frontier, to be appended to history
    pub new_commands: Vec<WorkflowCommand>,
    /// Output value if completed
    pub output: Option<Value>,
    /// Error message if failed or cancelled
    pub error: Option<String>,
    /// Failure type if failed
    pub failure_type: Option<FailureType>,
    /// Query values published by the code
    pub query_state: BTreeMap<String, Value>,
}

impl WorkflowTaskResult {
    fn new(state: SchedulerState) -> Self {
        Self {
            state,
            commands: vec![],
            new_commands: vec![],
            output: None,
            error: None,
            failure_type: None,
            query_state: BTreeMap::new(),
        }
    }

    /// Check if the drive issued any activity calls past the recorded frontier
    pub fn dispatched_activities(&self) -> usize {
        self.new_commands
            .iter()
            .filter(|c| matches!(c, WorkflowCommand::ScheduleActivity { .. }))
            .count()
    }
}

/// Drives an execution's workflow code.
///
/// Every drive runs the workflow function from the start inside a fresh
/// [`WorkflowContextImpl`] over the full history. Decisions already recorded
/// are matched to their events; the drive ends when the code returns or
/// blocks on something history does not hold yet.
///
/// A determinism fault is returned as `Err(DurableError::NonDeterminism)`,
/// never folded into a `Failed` state, so callers can tell it apart from
/// a workflow failing on its own terms.
#[derive(Debug, Clone)]
pub struct WorkflowScheduler {
    enable_determinism_validation: bool,
}

impl Default for WorkflowScheduler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl WorkflowScheduler {
    /// Create a scheduler
    pub fn new(enable_determinism_validation: bool) -> Self {
        Self {
            enable_determinism_validation,
        }
    }

    /// Run `workflow` against `history` until it returns or blocks
    pub async fn drive(
        &self,
        workflow: &RegisteredWorkflow,
        history: &History,
    ) -> Result<WorkflowTaskResult> {
        if !history
            .events()
            .first()
            .is_some_and(|e| e.event_type() == EventType::WorkflowStarted)
        {
            return Ok(WorkflowTaskResult::new(SchedulerState::NotStarted));
        }

        debug!(
            execution_id = %history.execution_id(),
            workflow_type = %workflow.metadata.kind,
            events = history.len(),
            "Driving workflow"
        );

        if self.enable_determinism_validation {
            let recorder = ValidatingCommandRecorder::new(
                DeterminismValidator::new(),
                EventLookup::command_events(history.events()),
                history.is_terminal(),
                history.last_sequence(),
            );
            self.run(workflow, history, recorder).await
        } else {
            self.run(workflow, history, CommandCollector::new()).await
        }
    }

    async fn run<R: CommandRecorder + 'static>(
        &self,
        workflow: &RegisteredWorkflow,
        history: &History,
        recorder: R,
    ) -> Result<WorkflowTaskResult> {
        let ctx = Arc::new(WorkflowContextImpl::new(history, recorder));
        let input = history.execution().input.clone();
        let outcome = workflow
            .execute(Arc::clone(&ctx) as Arc<dyn WorkflowContext>, input)
            .await;

        let result = self.handle_result(&ctx, history, outcome)?;
        debug!(
            execution_id = %history.execution_id(),
            state = ?result.state,
            new_commands = result.new_commands.len(),
            "Drive finished"
        );
        Ok(result)
    }

    fn handle_result<R: CommandRecorder>(
        &self,
        ctx: &WorkflowContextImpl<R>,
        history: &History,
        outcome: Result<Value>,
    ) -> Result<WorkflowTaskResult> {
        // A fault wins over whatever the code returned after catching it
        if let Some(violation) = ctx.fault() {
            return Err(DurableError::NonDeterminism(violation));
        }

        let mut result = match (ctx.awaiting(), outcome) {
            (_, Err(DurableError::NonDeterminism(violation))) => {
                return Err(DurableError::NonDeterminism(violation));
            }
            (Some(awaiting), _) => {
                self.validate_consumed(ctx)?;
                let timed_out = history
                    .terminal_event()
                    .is_some_and(|e| e.event_type() == EventType::WorkflowTimedOut);
                if timed_out {
                    WorkflowTaskResult::new(SchedulerState::TimedOut)
                } else {
                    WorkflowTaskResult::new(SchedulerState::Suspended(awaiting))
                }
            }
            (None, Err(DurableError::Suspended { reason })) => {
                // Raised by the code itself rather than a blocking call
                return Err(DurableError::Other(format!(
                    "Workflow returned a suspension without awaiting anything: {}",
                    reason
                )));
            }
            (None, Ok(output)) => {
                self.finish(
                    ctx,
                    WorkflowCommand::CompleteExecution {
                        output: output.clone(),
                    },
                )?;
                let mut result = WorkflowTaskResult::new(SchedulerState::Completed);
                result.output = Some(output);
                result
            }
            (None, Err(DurableError::Cancelled(reason))) => {
                self.finish(
                    ctx,
                    WorkflowCommand::CancelExecution {
                        reason: reason.clone(),
                    },
                )?;
                let mut result = WorkflowTaskResult::new(SchedulerState::Cancelled);
                result.error = Some(reason);
                result
            }
            (None, Err(e)) => {
                let failure_type = classify_error(&e);
                let error = e.to_string();
                self.finish(
                    ctx,
                    WorkflowCommand::FailExecution {
                        error: error.clone(),
                        failure_type: failure_type.as_str().to_string(),
                    },
                )?;
                let mut result = WorkflowTaskResult::new(SchedulerState::Failed);
                result.error = Some(error);
                result.failure_type = Some(failure_type);
                result
            }
        };

        result.commands = ctx.get_commands();
        result.new_commands = ctx.take_new_commands();
        result.query_state = ctx.query_state();

        // Re-driving a closed history never produces anything to append
        if history.is_terminal() {
            result.new_commands.clear();
        }
        Ok(result)
    }

    fn finish<R: CommandRecorder>(
        &self,
        ctx: &WorkflowContextImpl<R>,
        command: WorkflowCommand,
    ) -> Result<()> {
        ctx.record_command(command)?;
        self.validate_consumed(ctx)
    }

    fn validate_consumed<R: CommandRecorder>(&self, ctx: &WorkflowContextImpl<R>) -> Result<()> {
        ctx.validate_all_consumed()
            .map_err(DurableError::NonDeterminism)
    }
}
