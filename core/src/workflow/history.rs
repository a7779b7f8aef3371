//! Execution identity, status and the ordered event history of one execution

use crate::error::{CoreError, CoreResult};
use crate::workflow::event::{EventType, HistoryEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identity of a workflow execution.
///
/// The workflow id is chosen by the caller (or generated); the run id is
/// unique per start and seeds the execution's deterministic randomness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionId {
    pub workflow_id: String,
    pub run_id: Uuid,
}

impl ExecutionId {
    /// Create an execution id
    pub fn new(workflow_id: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id,
        }
    }

    /// Create an execution id with a fresh run id
    pub fn generate(workflow_id: impl Into<String>) -> Self {
        Self::new(workflow_id, Uuid::new_v4())
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.workflow_id, self.run_id)
    }
}

/// Status of a workflow execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl ExecutionStatus {
    /// Check if the status is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Status an execution ends in when this terminal event is appended
    pub fn from_terminal_event(event_type: EventType) -> Option<Self> {
        match event_type {
            EventType::WorkflowCompleted => Some(Self::Completed),
            EventType::WorkflowFailed => Some(Self::Failed),
            EventType::WorkflowCancelled => Some(Self::Cancelled),
            EventType::WorkflowTimedOut => Some(Self::TimedOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::TimedOut => "TIMED_OUT",
        };
        f.write_str(s)
    }
}

/// Descriptive record of an execution kept next to its history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInfo {
    pub execution_id: ExecutionId,
    pub workflow_type: String,
    pub input: Value,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<DateTime<Utc>>,
}

impl ExecutionInfo {
    /// Create a running execution record
    pub fn new(
        execution_id: ExecutionId,
        workflow_type: impl Into<String>,
        input: Value,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id,
            workflow_type: workflow_type.into(),
            input,
            status: ExecutionStatus::Running,
            start_time,
            close_time: None,
        }
    }
}

/// The ordered events of one execution.
///
/// This is the exchange format for offline replay: a history captured from a
/// running system serializes to JSON and is loaded back with [`History::from_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    execution: ExecutionInfo,
    events: Vec<HistoryEvent>,
}

impl History {
    /// Create a history, checking that sequence numbers run 1, 2, 3, ...
    pub fn new(execution: ExecutionInfo, events: Vec<HistoryEvent>) -> CoreResult<Self> {
        for (index, event) in events.iter().enumerate() {
            let expected = index as i32 + 1;
            if event.sequence_number() != expected {
                return Err(CoreError::SequenceConflict {
                    execution_id: execution.execution_id.to_string(),
                    expected,
                    actual: event.sequence_number(),
                });
            }
        }
        Ok(Self { execution, events })
    }

    /// Parse a history captured as JSON
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let history: History = serde_json::from_str(json)?;
        Self::new(history.execution, history.events)
    }

    /// Serialize the history as pretty-printed JSON
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Execution record
    pub fn execution(&self) -> &ExecutionInfo {
        &self.execution
    }

    /// Execution id
    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution.execution_id
    }

    /// All events in sequence order
    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    /// Consume the history, returning its events
    pub fn into_events(self) -> Vec<HistoryEvent> {
        self.events
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the history has no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sequence number of the last event, 0 when empty
    pub fn last_sequence(&self) -> i32 {
        self.events
            .last()
            .map(|e| e.sequence_number())
            .unwrap_or(0)
    }

    /// Terminal event, if the history is closed
    pub fn terminal_event(&self) -> Option<&HistoryEvent> {
        self.events
            .iter()
            .find(|e| e.event_type().is_workflow_terminal())
    }

    /// Check if the history is closed
    pub fn is_terminal(&self) -> bool {
        self.terminal_event().is_some()
    }

    /// Event types in order, useful for assertions
    pub fn event_types(&self) -> Vec<EventType> {
        self.events.iter().map(|e| e.event_type()).collect()
    }

    /// Events of a given type, in order
    pub fn events_of_type(&self, event_type: EventType) -> Vec<&HistoryEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Append the next event.
    ///
    /// The event must carry the next sequence number and the history must
    /// still be open. A terminal event also closes the execution record.
    pub fn push(&mut self, event: HistoryEvent) -> CoreResult<()> {
        if let Some(terminal) = self.terminal_event() {
            return Err(CoreError::HistoryClosed {
                execution_id: self.execution.execution_id.to_string(),
                closed_by: terminal.event_type(),
            });
        }

        let expected = self.last_sequence() + 1;
        if event.sequence_number() != expected {
            return Err(CoreError::SequenceConflict {
                execution_id: self.execution.execution_id.to_string(),
                expected,
                actual: event.sequence_number(),
            });
        }

        if let Some(status) = ExecutionStatus::from_terminal_event(event.event_type()) {
            self.execution.status = status;
            self.execution.close_time = Some(event.timestamp());
        }
        self.events.push(event);
        Ok(())
    }
}
