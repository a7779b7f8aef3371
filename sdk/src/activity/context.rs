//! Context handed to a running activity attempt

use chrono::{DateTime, Utc};
use durable_core::ExecutionId;

/// Information about the activity attempt being executed.
///
/// Unlike the workflow context, nothing here needs to be deterministic:
/// activities run once per attempt and their results are recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityContext {
    execution_id: ExecutionId,
    activity_type: String,
    correlation_token: u32,
    attempt: u32,
    scheduled_time: DateTime<Utc>,
}

impl ActivityContext {
    /// Create a new activity context
    pub fn new(
        execution_id: ExecutionId,
        activity_type: impl Into<String>,
        correlation_token: u32,
        attempt: u32,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id,
            activity_type: activity_type.into(),
            correlation_token,
            attempt,
            scheduled_time,
        }
    }

    /// Execution that scheduled this activity
    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    /// Workflow id of the scheduling execution
    pub fn workflow_id(&self) -> &str {
        &self.execution_id.workflow_id
    }

    pub fn activity_type(&self) -> &str {
        &self.activity_type
    }

    /// Correlation token linking this call to its recorded events
    pub fn correlation_token(&self) -> u32 {
        self.correlation_token
    }

    /// Current attempt number (1-based)
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Timestamp of the `ACTIVITY_SCHEDULED` event
    pub fn scheduled_time(&self) -> DateTime<Utc> {
        self.scheduled_time
    }
}
