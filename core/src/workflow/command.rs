//! Workflow commands emitted by running workflow code

use crate::activity::ActivityOptions;
use crate::workflow::event::EventType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a suspended workflow is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Awaiting {
    /// Completion or failure of the activity with this correlation token
    ActivityCompletion {
        correlation_token: u32,
        activity_type: String,
    },
    /// The timer with this id firing
    TimerFired { timer_id: String },
    /// A signal with this name, or any signal when no name is given
    Signal { name: Option<String> },
}

impl Awaiting {
    /// Check whether an event is the one this suspension is waiting on.
    ///
    /// Cancellation requests always resume a suspended workflow so it can
    /// observe them.
    pub fn is_resumed_by(&self, event_type: EventType, data: &Value) -> bool {
        if event_type == EventType::CancellationRequested {
            return true;
        }
        match self {
            Self::ActivityCompletion {
                correlation_token, ..
            } => {
                event_type.is_activity_terminal()
                    && data.get("correlationToken").and_then(|v| v.as_u64())
                        == Some(*correlation_token as u64)
            }
            Self::TimerFired { timer_id } => {
                event_type == EventType::TimerFired
                    && data.get("timerId").and_then(|v| v.as_str()) == Some(timer_id.as_str())
            }
            Self::Signal { name } => {
                event_type == EventType::SignalReceived
                    && match name {
                        Some(name) => {
                            data.get("signalName").and_then(|v| v.as_str())
                                == Some(name.as_str())
                        }
                        None => true,
                    }
            }
        }
    }
}

impl std::fmt::Display for Awaiting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActivityCompletion {
                correlation_token,
                activity_type,
            } => write!(f, "activity '{}' (token {})", activity_type, correlation_token),
            Self::TimerFired { timer_id } => write!(f, "timer '{}'", timer_id),
            Self::Signal { name: Some(name) } => write!(f, "signal '{}'", name),
            Self::Signal { name: None } => write!(f, "any signal"),
        }
    }
}

/// Intent emitted by running workflow code.
///
/// Commands are ephemeral: they exist between emission and their translation
/// into history events by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum WorkflowCommand {
    /// Dispatch an activity
    ScheduleActivity {
        correlation_token: u32,
        activity_type: String,
        input: Value,
        options: ActivityOptions,
    },
    /// Start a durable timer
    StartTimer { timer_id: String, duration_ms: i64 },
    /// Finish the execution with an output
    CompleteExecution { output: Value },
    /// Finish the execution with an error
    FailExecution { error: String, failure_type: String },
    /// Finish the execution after observing cancellation
    CancelExecution { reason: String },
    /// Nothing to do until the awaited event arrives
    ContinueWaiting { awaiting: Awaiting },
}

impl WorkflowCommand {
    /// Event type this command is recorded as, if any
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Self::ScheduleActivity { .. } => Some(EventType::ActivityScheduled),
            Self::StartTimer { .. } => Some(EventType::TimerStarted),
            Self::CompleteExecution { .. } => Some(EventType::WorkflowCompleted),
            Self::FailExecution { .. } => Some(EventType::WorkflowFailed),
            Self::CancelExecution { .. } => Some(EventType::WorkflowCancelled),
            Self::ContinueWaiting { .. } => None,
        }
    }

    /// Get the command type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ScheduleActivity { .. } => "ScheduleActivity",
            Self::StartTimer { .. } => "StartTimer",
            Self::CompleteExecution { .. } => "CompleteExecution",
            Self::FailExecution { .. } => "FailExecution",
            Self::CancelExecution { .. } => "CancelExecution",
            Self::ContinueWaiting { .. } => "ContinueWaiting",
        }
    }

    /// Check if this command finishes the execution
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CompleteExecution { .. } | Self::FailExecution { .. } | Self::CancelExecution { .. }
        )
    }

    /// Event payload recorded for this command
    pub fn event_data(&self) -> Value {
        match self {
            Self::ScheduleActivity {
                correlation_token,
                activity_type,
                input,
                options,
            } => serde_json::json!({
                "correlationToken": correlation_token,
                "activityType": activity_type,
                "input": input,
                "options": options,
            }),
            Self::StartTimer {
                timer_id,
                duration_ms,
            } => serde_json::json!({
                "timerId": timer_id,
                "durationMs": duration_ms,
            }),
            Self::CompleteExecution { output } => serde_json::json!({ "output": output }),
            Self::FailExecution {
                error,
                failure_type,
            } => serde_json::json!({
                "error": error,
                "failureType": failure_type,
            }),
            Self::CancelExecution { reason } => serde_json::json!({ "reason": reason }),
            Self::ContinueWaiting { awaiting } => {
                serde_json::to_value(awaiting).unwrap_or(Value::Null)
            }
        }
    }
}
