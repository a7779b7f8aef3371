//! History event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event types that can be recorded in an execution's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Workflow lifecycle events
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowFailed,
    WorkflowCancelled,
    WorkflowTimedOut,
    CancellationRequested,

    // Activity events
    ActivityScheduled,
    ActivityAttemptFailed,
    ActivityCompleted,
    ActivityFailed,

    // Timer events
    TimerStarted,
    TimerFired,

    // Signal events
    SignalReceived,
}

impl EventType {
    /// Check if this event type closes the execution's history
    pub fn is_workflow_terminal(&self) -> bool {
        matches!(
            self,
            Self::WorkflowCompleted
                | Self::WorkflowFailed
                | Self::WorkflowCancelled
                | Self::WorkflowTimedOut
        )
    }

    /// Check if this event type resolves an activity call
    pub fn is_activity_terminal(&self) -> bool {
        matches!(self, Self::ActivityCompleted | Self::ActivityFailed)
    }

    /// Check if this event type is produced by a workflow command.
    ///
    /// These are the events the determinism validator matches commands against,
    /// in order. `WorkflowTimedOut` is appended by the engine, not the workflow.
    pub fn is_command_event(&self) -> bool {
        matches!(
            self,
            Self::ActivityScheduled
                | Self::TimerStarted
                | Self::WorkflowCompleted
                | Self::WorkflowFailed
                | Self::WorkflowCancelled
        )
    }

    /// Get the wire representation of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowStarted => "WORKFLOW_STARTED",
            Self::WorkflowCompleted => "WORKFLOW_COMPLETED",
            Self::WorkflowFailed => "WORKFLOW_FAILED",
            Self::WorkflowCancelled => "WORKFLOW_CANCELLED",
            Self::WorkflowTimedOut => "WORKFLOW_TIMED_OUT",
            Self::CancellationRequested => "CANCELLATION_REQUESTED",
            Self::ActivityScheduled => "ACTIVITY_SCHEDULED",
            Self::ActivityAttemptFailed => "ACTIVITY_ATTEMPT_FAILED",
            Self::ActivityCompleted => "ACTIVITY_COMPLETED",
            Self::ActivityFailed => "ACTIVITY_FAILED",
            Self::TimerStarted => "TIMER_STARTED",
            Self::TimerFired => "TIMER_FIRED",
            Self::SignalReceived => "SIGNAL_RECEIVED",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable event from an execution's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Sequence number of this event (1-indexed, 0 while unassigned)
    #[serde(rename = "sequenceNumber")]
    sequence_number: i32,

    /// Type of the event
    #[serde(rename = "type")]
    event_type: EventType,

    /// Event data (varies by event type)
    data: Value,

    /// Timestamp of the event
    #[serde(rename = "timestamp")]
    timestamp: DateTime<Utc>,
}

impl HistoryEvent {
    /// Create a new history event
    pub fn new(
        sequence_number: i32,
        event_type: EventType,
        data: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sequence_number,
            event_type,
            data,
            timestamp,
        }
    }

    /// Create an event that has not been assigned a position in a history yet
    pub fn unsequenced(event_type: EventType, data: Value, timestamp: DateTime<Utc>) -> Self {
        Self::new(0, event_type, data, timestamp)
    }

    /// Get the sequence number
    pub fn sequence_number(&self) -> i32 {
        self.sequence_number
    }

    /// Get the event type
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Get the timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Get a field from the event data as a string
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Get a field from the event data as an i64
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|v| v.as_i64())
    }

    /// Get a field from the event data as a u32
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.data
            .get(key)
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Get a field from the event data
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get the data value
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Correlation token of an activity event
    pub fn correlation_token(&self) -> Option<u32> {
        self.get_u32("correlationToken")
    }

    /// Timer id of a timer event
    pub fn timer_id(&self) -> Option<&str> {
        self.get_string("timerId")
    }

    /// Assign the event its position in a history
    pub fn with_sequence_number(mut self, sequence_number: i32) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    // === Builder methods for setting event data fields ===

    fn with_field(mut self, key: &str, value: Value) -> Self {
        match self.data {
            Value::Object(ref mut map) => {
                map.insert(key.to_string(), value);
            }
            Value::Null => {
                let mut map = serde_json::Map::new();
                map.insert(key.to_string(), value);
                self.data = Value::Object(map);
            }
            _ => {}
        }
        self
    }

    /// Set the activity correlation token
    pub fn with_correlation_token(self, token: u32) -> Self {
        self.with_field("correlationToken", Value::from(token))
    }

    /// Set the activity type
    pub fn with_activity_type(self, activity_type: impl Into<String>) -> Self {
        self.with_field("activityType", Value::String(activity_type.into()))
    }

    /// Set the result
    pub fn with_result(self, result: Value) -> Self {
        self.with_field("result", result)
    }

    /// Set the timer id
    pub fn with_timer_id(self, timer_id: impl Into<String>) -> Self {
        self.with_field("timerId", Value::String(timer_id.into()))
    }

    /// Set the signal name
    pub fn with_signal_name(self, name: impl Into<String>) -> Self {
        self.with_field("signalName", Value::String(name.into()))
    }

    /// Set the error message
    pub fn with_error(self, error: impl Into<String>) -> Self {
        self.with_field("error", Value::String(error.into()))
    }

    /// Set the attempt number
    pub fn with_attempt(self, attempt: u32) -> Self {
        self.with_field("attempt", Value::from(attempt))
    }
}
