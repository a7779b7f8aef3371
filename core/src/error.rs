//! Core error types for the durable workflow engine
//!
//! Errors shared by the history store, the determinism validator and the SDK.
//! SDK-level error types wrap these.

use crate::workflow::EventType;

/// Core error type for history and configuration operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No history exists for the execution
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    /// A history already exists for the execution
    #[error("Execution already exists: {0}")]
    ExecutionAlreadyExists(String),

    /// The execution's history ends in a terminal event and accepts no more events
    #[error("History of execution {execution_id} is closed by {closed_by}")]
    HistoryClosed {
        execution_id: String,
        closed_by: EventType,
    },

    /// An event was appended at a position other than the next free one
    #[error("Sequence conflict for execution {execution_id}: expected {expected}, got {actual}")]
    SequenceConflict {
        execution_id: String,
        expected: i32,
        actual: i32,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Determinism violations detected while matching commands against history
///
/// Each variant names the sequence number of the recorded event the
/// offending command was compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeterminismViolationError {
    /// Command kind doesn't match the recorded event kind
    TypeMismatch {
        sequence: i32,
        expected: EventType,
        actual: EventType,
    },

    /// Activity type doesn't match the recorded activity
    ActivityTypeMismatch {
        sequence: i32,
        expected: String,
        actual: String,
    },

    /// Timer id doesn't match the recorded timer
    TimerIdMismatch {
        sequence: i32,
        expected: String,
        actual: String,
    },

    /// Timer duration doesn't match the recorded timer
    TimerDurationMismatch {
        sequence: i32,
        timer_id: String,
        expected_ms: i64,
        actual_ms: i64,
    },

    /// Workflow result doesn't match the recorded result
    ResultMismatch {
        sequence: i32,
        expected: String,
        actual: String,
    },

    /// Command emitted although the recorded history is closed
    UnexpectedCommand {
        sequence: i32,
        actual: EventType,
    },

    /// Recorded decision that the workflow no longer makes
    UnmatchedEvent {
        sequence: i32,
        expected: EventType,
    },
}

impl DeterminismViolationError {
    /// Sequence number of the recorded event involved in the violation
    pub fn sequence(&self) -> i32 {
        match self {
            Self::TypeMismatch { sequence, .. }
            | Self::ActivityTypeMismatch { sequence, .. }
            | Self::TimerIdMismatch { sequence, .. }
            | Self::TimerDurationMismatch { sequence, .. }
            | Self::ResultMismatch { sequence, .. }
            | Self::UnexpectedCommand { sequence, .. }
            | Self::UnmatchedEvent { sequence, .. } => *sequence,
        }
    }
}

impl std::fmt::Display for DeterminismViolationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch {
                sequence,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Type mismatch at sequence {}: expected {}, got {}",
                    sequence, expected, actual
                )
            }
            Self::ActivityTypeMismatch {
                sequence,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Activity type mismatch at sequence {}: expected '{}', got '{}'",
                    sequence, expected, actual
                )
            }
            Self::TimerIdMismatch {
                sequence,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Timer ID mismatch at sequence {}: expected '{}', got '{}'",
                    sequence, expected, actual
                )
            }
            Self::TimerDurationMismatch {
                sequence,
                timer_id,
                expected_ms,
                actual_ms,
            } => {
                write!(
                    f,
                    "Timer duration mismatch at sequence {} for '{}': expected {}ms, got {}ms",
                    sequence, timer_id, expected_ms, actual_ms
                )
            }
            Self::ResultMismatch {
                sequence,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Result mismatch at sequence {}: expected {}, got {}",
                    sequence, expected, actual
                )
            }
            Self::UnexpectedCommand { sequence, actual } => {
                write!(
                    f,
                    "Unexpected command after sequence {}: {} has no recorded event in a closed history",
                    sequence, actual
                )
            }
            Self::UnmatchedEvent { sequence, expected } => {
                write!(
                    f,
                    "Unmatched event at sequence {}: history records {} but the workflow did not issue it",
                    sequence, expected
                )
            }
        }
    }
}

impl std::error::Error for DeterminismViolationError {}
