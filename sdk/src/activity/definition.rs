//! ActivityDefinition trait and activity-side error type

use crate::activity::context::ActivityContext;
use crate::workflow::definition::generate_schema;
use async_trait::async_trait;
use durable_core::ActivityFailureCause;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Error returned by an activity attempt.
///
/// Application errors are retried according to the caller's retry policy
/// unless marked non-retryable or their `error_type` is listed in the
/// policy's non-retryable types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActivityError {
    /// Error raised by activity business logic
    #[error("{message}")]
    Application {
        message: String,
        error_type: Option<String>,
        non_retryable: bool,
    },

    /// The attempt did not finish within its timeout window
    #[error("Activity timed out")]
    Timeout,

    /// The attempt was aborted because the execution was cancelled
    #[error("Activity cancelled")]
    Cancelled,
}

impl ActivityError {
    /// Create a retryable application error
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            error_type: None,
            non_retryable: false,
        }
    }

    /// Create an application error that must not be retried
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            error_type: None,
            non_retryable: true,
        }
    }

    /// Attach an error type name, matched against `non_retryable_error_types`
    pub fn with_error_type(self, error_type: impl Into<String>) -> Self {
        match self {
            Self::Application {
                message,
                non_retryable,
                ..
            } => Self::Application {
                message,
                error_type: Some(error_type.into()),
                non_retryable,
            },
            other => other,
        }
    }

    /// Error type name, if any
    pub fn error_type(&self) -> Option<&str> {
        match self {
            Self::Application { error_type, .. } => error_type.as_deref(),
            _ => None,
        }
    }

    /// Whether the activity itself allows another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Application { non_retryable, .. } => !non_retryable,
            Self::Timeout => true,
            Self::Cancelled => false,
        }
    }

    /// Failure cause recorded on `ACTIVITY_FAILED`
    pub fn cause(&self) -> ActivityFailureCause {
        match self {
            Self::Application { .. } => ActivityFailureCause::Application,
            Self::Timeout => ActivityFailureCause::Timeout,
            Self::Cancelled => ActivityFailureCause::Cancelled,
        }
    }
}

impl From<serde_json::Error> for ActivityError {
    fn from(err: serde_json::Error) -> Self {
        Self::non_retryable(err.to_string()).with_error_type("SERIALIZATION")
    }
}

/// Definition of an activity with typed input and output.
///
/// Activities hold the side effects of a workflow: network calls, database
/// writes, anything that may fail or produce different results when run
/// again. Their results are recorded, so workflow code never observes a
/// second execution of a completed attempt.
#[async_trait]
pub trait ActivityDefinition: Send + Sync {
    /// Input type for the activity
    type Input: Serialize + DeserializeOwned + JsonSchema + Send;
    /// Output type for the activity
    type Output: Serialize + DeserializeOwned + JsonSchema + Send;

    /// Unique identifier for this activity type
    fn kind(&self) -> &str;

    /// Execute one attempt of the activity
    async fn execute(
        &self,
        input: Self::Input,
        ctx: &ActivityContext,
    ) -> Result<Self::Output, ActivityError>;

    /// Human-readable name (defaults to kind)
    fn name(&self) -> &str {
        self.kind()
    }

    /// Description of the activity
    fn description(&self) -> Option<&str> {
        None
    }

    /// Tags for categorization
    fn tags(&self) -> Vec<String> {
        vec![]
    }

    /// JSON Schema of the input, generated from `Input`
    fn input_schema(&self) -> Option<Value> {
        Some(generate_schema::<Self::Input>())
    }

    /// JSON Schema of the output, generated from `Output`
    fn output_schema(&self) -> Option<Value> {
        Some(generate_schema::<Self::Output>())
    }
}
