//! Determinism validation of commands against recorded history

use crate::error::DeterminismViolationError;
use crate::workflow::command::WorkflowCommand;
use crate::workflow::event::HistoryEvent;
use tracing::debug;

/// Validates that a re-run of workflow code issues the same commands it
/// issued originally.
///
/// A command is compared against the recorded command event at the same
/// position. Besides the event kind, these parameters must agree:
/// - activity type of a scheduled activity
/// - timer id and duration of a started timer
/// - output of a completed execution
#[derive(Debug, Clone, Default)]
pub struct DeterminismValidator {
    _private: (),
}

impl DeterminismValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a command against the event recorded at its position.
    ///
    /// `recorded` is `None` when the history has no command event at this
    /// position. That is only a violation when the history is closed, since
    /// a live execution legitimately issues new commands. `last_sequence`
    /// is the last sequence number of the history and is reported for
    /// commands issued past a closed history.
    pub fn validate_command(
        &self,
        command: &WorkflowCommand,
        recorded: Option<&HistoryEvent>,
        history_closed: bool,
        last_sequence: i32,
    ) -> Result<(), DeterminismViolationError> {
        let Some(actual) = command.event_type() else {
            return Ok(());
        };

        let Some(event) = recorded else {
            if history_closed {
                return Err(DeterminismViolationError::UnexpectedCommand {
                    sequence: last_sequence,
                    actual,
                });
            }
            return Ok(());
        };

        let sequence = event.sequence_number();
        if event.event_type() != actual {
            return Err(DeterminismViolationError::TypeMismatch {
                sequence,
                expected: event.event_type(),
                actual,
            });
        }

        match command {
            WorkflowCommand::ScheduleActivity { activity_type, .. } => {
                let expected = event.get_string("activityType").unwrap_or_default();
                if expected != activity_type.as_str() {
                    return Err(DeterminismViolationError::ActivityTypeMismatch {
                        sequence,
                        expected: expected.to_string(),
                        actual: activity_type.clone(),
                    });
                }
            }
            WorkflowCommand::StartTimer {
                timer_id,
                duration_ms,
            } => {
                let expected_id = event.timer_id().unwrap_or_default();
                if expected_id != timer_id.as_str() {
                    return Err(DeterminismViolationError::TimerIdMismatch {
                        sequence,
                        expected: expected_id.to_string(),
                        actual: timer_id.clone(),
                    });
                }
                let expected_ms = event.get_i64("durationMs").unwrap_or_default();
                if expected_ms != *duration_ms {
                    return Err(DeterminismViolationError::TimerDurationMismatch {
                        sequence,
                        timer_id: timer_id.clone(),
                        expected_ms,
                        actual_ms: *duration_ms,
                    });
                }
            }
            WorkflowCommand::CompleteExecution { output } => {
                let expected = event.get("output").cloned().unwrap_or_default();
                if &expected != output {
                    return Err(DeterminismViolationError::ResultMismatch {
                        sequence,
                        expected: expected.to_string(),
                        actual: output.to_string(),
                    });
                }
            }
            _ => {}
        }

        debug!(
            sequence,
            command = command.type_name(),
            "Command matches recorded event"
        );
        Ok(())
    }

    /// Report the first recorded command event a finished drive never
    /// reached, if any.
    pub fn validate_all_consumed(
        &self,
        unmatched: &[HistoryEvent],
    ) -> Result<(), DeterminismViolationError> {
        match unmatched.first() {
            Some(event) => Err(DeterminismViolationError::UnmatchedEvent {
                sequence: event.sequence_number(),
                expected: event.event_type(),
            }),
            None => Ok(()),
        }
    }
}
