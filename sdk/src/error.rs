//! Error types for the durable workflow SDK

// Re-export core error types
pub use durable_core::{ActivityFailureCause, CoreError, DeterminismViolationError};

use serde::{Deserialize, Serialize};

#[cfg(test)]
use durable_core::EventType;

/// Main error type for the durable workflow SDK
#[derive(Debug, thiserror::Error)]
pub enum DurableError {
    /// Workflow is suspended waiting for an event (activity completion, timer, signal)
    #[error("Workflow suspended: {reason}")]
    Suspended { reason: String },

    /// Activity call failed after its retry policy was exhausted
    #[error("Activity '{activity_type}' failed ({cause}): {message}")]
    ActivityFailed {
        activity_type: String,
        message: String,
        error_type: Option<String>,
        cause: ActivityFailureCause,
    },

    /// Workflow code diverged from its recorded history
    #[error("Non-determinism detected: {0}")]
    NonDeterminism(DeterminismViolationError),

    /// Cancellation was requested for the execution
    #[error("Workflow cancelled: {0}")]
    Cancelled(String),

    /// Permanent failure raised by workflow code
    #[error("Non-retryable error: {0}")]
    NonRetryable(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The execution has no in-memory state to answer from
    #[error("Execution is not running: {0}")]
    NotRunning(String),

    /// No execution with this id exists
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    /// The execution never published a query value under this name
    #[error("Query not found: {0}")]
    QueryNotFound(String),

    /// Workflow type not registered
    #[error("Workflow not registered: {0}")]
    WorkflowNotRegistered(String),

    /// Activity type not registered
    #[error("Activity not registered: {0}")]
    ActivityNotRegistered(String),

    /// Execution ended in failure
    #[error("Workflow failed ({failure_type}): {message}")]
    WorkflowFailed {
        message: String,
        failure_type: FailureType,
    },

    /// Execution exceeded its execution timeout
    #[error("Workflow timed out: {0}")]
    TimedOut(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// History store error
    #[error("Store error: {0}")]
    Store(CoreError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DurableError {
    /// Check if this error is a suspension rather than a failure
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }

    /// Check if this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Check if an append lost to another writer of the same history
    pub fn is_stale_writer(&self) -> bool {
        matches!(
            self,
            Self::Store(CoreError::SequenceConflict { .. } | CoreError::HistoryClosed { .. })
        )
    }

    /// Check if this error reports a determinism violation, either directly
    /// or as the recorded failure of an execution
    pub fn is_non_determinism(&self) -> bool {
        matches!(
            self,
            Self::NonDeterminism(_)
                | Self::WorkflowFailed {
                    failure_type: FailureType::NonDeterminism,
                    ..
                }
        )
    }

    /// Errors workflow code must propagate instead of handling.
    ///
    /// Compensation logic that catches activity failures should re-raise
    /// these unchanged.
    pub fn is_workflow_control(&self) -> bool {
        matches!(self, Self::Suspended { .. } | Self::NonDeterminism(_))
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, DurableError>;

impl From<CoreError> for DurableError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Serialization(e) => DurableError::Serialization(e),
            CoreError::InvalidConfiguration(msg) => DurableError::InvalidConfiguration(msg),
            CoreError::ExecutionNotFound(id) => DurableError::ExecutionNotFound(id),
            other => DurableError::Store(other),
        }
    }
}

impl From<DeterminismViolationError> for DurableError {
    fn from(err: DeterminismViolationError) -> Self {
        DurableError::NonDeterminism(err)
    }
}

/// Classification of an execution failure, recorded as `failureType` on
/// `WORKFLOW_FAILED` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    NonDeterminism,
    NonRetryable,
    ActivityFailure,
    Cancelled,
    Unknown,
}

impl FailureType {
    /// Get the wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonDeterminism => "NON_DETERMINISM",
            Self::NonRetryable => "NON_RETRYABLE",
            Self::ActivityFailure => "ACTIVITY_FAILURE",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse the wire representation, falling back to `Unknown`
    pub fn parse(value: &str) -> Self {
        match value {
            "NON_DETERMINISM" => Self::NonDeterminism,
            "NON_RETRYABLE" => Self::NonRetryable,
            "ACTIVITY_FAILURE" => Self::ActivityFailure,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an error returned by workflow code
pub fn classify_error(error: &DurableError) -> FailureType {
    match error {
        DurableError::NonDeterminism(_) => FailureType::NonDeterminism,
        DurableError::NonRetryable(_) => FailureType::NonRetryable,
        DurableError::ActivityFailed { .. } => FailureType::ActivityFailure,
        DurableError::Cancelled(_) => FailureType::Cancelled,
        DurableError::WorkflowFailed { failure_type, .. } => *failure_type,
        _ => FailureType::Unknown,
    }
}
