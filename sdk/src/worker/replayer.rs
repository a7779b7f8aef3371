//! WorkflowReplayer - Offline replay of captured histories
//!
//! Replay re-runs workflow code against a history without a store or an
//! activity executor behind it. It answers one question: does the code
//! still make the decisions the history recorded?

use crate::error::{DurableError, Result};
use crate::worker::registry::WorkflowRegistry;
use crate::worker::scheduler::{SchedulerState, WorkflowScheduler};
use crate::worker::timer::{Clock, RuntimeClock};
use crate::workflow::bridge::EventBridge;
use durable_core::{ExecutionInfo, History, HistoryEvent, WorkflowCommand};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of replaying a history
#[derive(Debug, Clone)]
pub struct ReplayResult {
    /// State the code reached
    pub state: SchedulerState,
    /// Output if the code completed
    pub output: Option<Value>,
    /// Every command the code emitted
    pub commands: Vec<WorkflowCommand>,
    /// Decisions past the end of the history
    pub pending_commands: Vec<WorkflowCommand>,
}

impl ReplayResult {
    /// Check if the code made decisions the history does not hold yet
    pub fn reached_live_frontier(&self) -> bool {
        !self.pending_commands.is_empty()
    }

    /// Activity calls replay would have issued
    pub fn dispatched_activities(&self) -> usize {
        self.pending_commands
            .iter()
            .filter(|c| matches!(c, WorkflowCommand::ScheduleActivity { .. }))
            .count()
    }
}

/// Replays histories against registered workflow code
#[derive(Debug, Clone)]
pub struct WorkflowReplayer {
    registry: Arc<WorkflowRegistry>,
    scheduler: WorkflowScheduler,
}

impl WorkflowReplayer {
    pub fn new(registry: Arc<WorkflowRegistry>, enable_determinism_validation: bool) -> Self {
        Self {
            registry,
            scheduler: WorkflowScheduler::new(enable_determinism_validation),
        }
    }

    /// Replay `history` against the code registered as `workflow_type`.
    ///
    /// Returns `Err(DurableError::NonDeterminism)` when the code diverges
    /// from the recorded decisions. A history that ends before the code
    /// finishes is not a fault; the extra decisions are returned as
    /// pending commands.
    pub async fn replay(&self, workflow_type: &str, history: &History) -> Result<ReplayResult> {
        let workflow = self.registry.require(workflow_type)?;
        let result = self.scheduler.drive(&workflow, history).await?;

        info!(
            workflow_id = %history.execution_id(),
            workflow_type = %workflow_type,
            events = history.len(),
            state = ?result.state,
            pending = result.new_commands.len(),
            "Replay finished"
        );

        Ok(ReplayResult {
            state: result.state,
            output: result.output,
            commands: result.commands,
            pending_commands: result.new_commands,
        })
    }

    /// Replay a history captured as JSON
    pub async fn replay_json(&self, workflow_type: &str, json: &str) -> Result<ReplayResult> {
        let history = History::from_json(json)?;
        self.replay(workflow_type, &history).await
    }

    /// Replay events received in any order, such as pages of a feed.
    ///
    /// Events are put back in sequence order first; a gap in the sequence
    /// is an error.
    pub async fn replay_events(
        &self,
        execution: ExecutionInfo,
        events: Vec<HistoryEvent>,
    ) -> Result<ReplayResult> {
        let clock: Arc<dyn Clock> = Arc::new(RuntimeClock::starting_at(execution.start_time));
        let workflow_type = execution.workflow_type.clone();
        let mut bridge = EventBridge::replay(History::new(execution, Vec::new())?, clock);

        for event in events {
            let applied = bridge.ingest(event)?;
            debug!(applied = applied.len(), buffered = bridge.buffered(), "Ingested event");
        }
        if bridge.buffered() > 0 {
            return Err(DurableError::Other(format!(
                "history has a gap after sequence {}",
                bridge.history().last_sequence()
            )));
        }

        self.replay(&workflow_type, bridge.history()).await
    }
}
