//! Activity execution utilities: options, retry policy and attempt outcomes

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Why an activity call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityFailureCause {
    /// The activity itself reported an error
    Application,
    /// No response arrived within the configured timeout
    Timeout,
    /// The call was aborted because the execution was cancelled
    Cancelled,
}

impl ActivityFailureCause {
    /// Get the wire representation of the cause
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "APPLICATION",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse the wire representation of a cause
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "APPLICATION" => Some(Self::Application),
            "TIMEOUT" => Some(Self::Timeout),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActivityFailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry policy for activity calls.
///
/// `maximum_attempts` counts every attempt including the first one;
/// zero means unlimited (bounded only by the schedule-to-close timeout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of attempts
    pub maximum_attempts: u32,
    /// Backoff before the second attempt in milliseconds
    pub initial_interval_ms: u64,
    /// Multiplier applied to the interval after each attempt
    pub backoff_coefficient: f64,
    /// Upper bound on the interval in milliseconds
    pub maximum_interval_ms: u64,
    /// Error types that fail the call without further attempts
    #[serde(default)]
    pub non_retryable_error_types: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            maximum_attempts: 3,
            initial_interval_ms: 1000, // 1 second
            backoff_coefficient: 2.0,
            maximum_interval_ms: 60_000, // 60 seconds
            non_retryable_error_types: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// Set the maximum number of attempts
    pub fn with_maximum_attempts(mut self, attempts: u32) -> Self {
        self.maximum_attempts = attempts;
        self
    }

    /// Set the initial interval
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval_ms = duration_millis(interval);
        self
    }

    /// Set the backoff coefficient
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    /// Set the maximum interval
    pub fn with_maximum_interval(mut self, interval: Duration) -> Self {
        self.maximum_interval_ms = duration_millis(interval);
        self
    }

    /// Add an error type that must not be retried
    pub fn with_non_retryable_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.non_retryable_error_types.push(error_type.into());
        self
    }

    /// Get the initial interval as Duration
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    /// Get the maximum interval as Duration
    pub fn maximum_interval(&self) -> Duration {
        Duration::from_millis(self.maximum_interval_ms)
    }

    /// Check whether an error type is listed as non-retryable
    pub fn is_non_retryable(&self, error_type: Option<&str>) -> bool {
        error_type
            .map(|t| self.non_retryable_error_types.iter().any(|n| n == t))
            .unwrap_or(false)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Calculate the backoff before the attempt that follows `attempt`.
///
/// `attempt` is 1-based: the delay after the first failed attempt is the
/// initial interval, each later delay is multiplied by the coefficient, and
/// the result is capped at the maximum interval.
pub fn calculate_backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base_ms = policy.initial_interval_ms as f64;
    let multiplier = policy
        .backoff_coefficient
        .powi(attempt.saturating_sub(1) as i32);
    let backoff_ms = base_ms * multiplier;
    let backoff = Duration::from_millis(backoff_ms as u64);
    std::cmp::min(backoff, policy.maximum_interval())
}

/// Check if a failed attempt should be followed by another one.
///
/// # Arguments
/// * `policy` - The retry policy
/// * `attempt` - The attempt that just failed (1-based)
/// * `is_retryable` - Whether the failure is retryable at all
pub fn should_retry(policy: &RetryPolicy, attempt: u32, is_retryable: bool) -> bool {
    is_retryable && (policy.maximum_attempts == 0 || attempt < policy.maximum_attempts)
}

/// Options attached to a scheduled activity.
///
/// At least one of the two timeouts must be set. `start_to_close` bounds a
/// single attempt, `schedule_to_close` bounds the whole call including retries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOptions {
    /// Per-attempt timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_to_close_timeout_ms: Option<u64>,
    /// Whole-call timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_to_close_timeout_ms: Option<u64>,
    /// Retry policy (a single attempt when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

impl ActivityOptions {
    /// Options with a start-to-close timeout
    pub fn start_to_close(timeout: Duration) -> Self {
        Self::default().with_start_to_close_timeout(timeout)
    }

    /// Options with a schedule-to-close timeout
    pub fn schedule_to_close(timeout: Duration) -> Self {
        Self::default().with_schedule_to_close_timeout(timeout)
    }

    /// Set the start-to-close timeout
    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout_ms = Some(duration_millis(timeout));
        self
    }

    /// Set the schedule-to-close timeout
    pub fn with_schedule_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_close_timeout_ms = Some(duration_millis(timeout));
        self
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Get the start-to-close timeout as Duration
    pub fn start_to_close_timeout(&self) -> Option<Duration> {
        self.start_to_close_timeout_ms.map(Duration::from_millis)
    }

    /// Get the schedule-to-close timeout as Duration
    pub fn schedule_to_close_timeout(&self) -> Option<Duration> {
        self.schedule_to_close_timeout_ms.map(Duration::from_millis)
    }

    /// Validate the options for an activity of the given type.
    ///
    /// A call without any timeout window, or with a zero timeout, is a
    /// configuration error.
    pub fn validate(&self, activity_type: &str) -> CoreResult<()> {
        if self.start_to_close_timeout_ms.is_none() && self.schedule_to_close_timeout_ms.is_none()
        {
            return Err(CoreError::InvalidConfiguration(format!(
                "activity '{}' requires a start-to-close or schedule-to-close timeout",
                activity_type
            )));
        }
        if self.start_to_close_timeout_ms == Some(0) || self.schedule_to_close_timeout_ms == Some(0)
        {
            return Err(CoreError::InvalidConfiguration(format!(
                "activity '{}' timeouts must be positive",
                activity_type
            )));
        }
        if let Some(policy) = &self.retry_policy {
            if policy.backoff_coefficient < 1.0 {
                return Err(CoreError::InvalidConfiguration(format!(
                    "activity '{}' backoff coefficient must be at least 1.0",
                    activity_type
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of a single activity attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActivityExecutionResult {
    /// Attempt completed successfully with an output value
    Completed { output: Value },
    /// Attempt failed with an error
    Failed {
        /// Human-readable error message
        error_message: String,
        /// Machine-readable error type for categorization
        error_type: Option<String>,
        /// Whether the activity allows another attempt
        is_retryable: bool,
    },
    /// Attempt was aborted by cancellation
    Cancelled,
    /// Attempt exceeded its timeout
    TimedOut,
}

impl ActivityExecutionResult {
    /// Create a successful completion result
    pub fn completed(output: Value) -> Self {
        Self::Completed { output }
    }

    /// Create a failed result with an optional error type
    pub fn failed(
        error_message: impl Into<String>,
        error_type: Option<String>,
        is_retryable: bool,
    ) -> Self {
        Self::Failed {
            error_message: error_message.into(),
            error_type,
            is_retryable,
        }
    }

    /// Check if this is a successful completion
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Failure cause of an unsuccessful attempt
    pub fn failure_cause(&self) -> Option<ActivityFailureCause> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { .. } => Some(ActivityFailureCause::Application),
            Self::Cancelled => Some(ActivityFailureCause::Cancelled),
            Self::TimedOut => Some(ActivityFailureCause::Timeout),
        }
    }

    /// Check if the attempt may be followed by another one, given the policy
    pub fn can_retry(&self, policy: &RetryPolicy) -> bool {
        match self {
            Self::Failed {
                error_type,
                is_retryable,
                ..
            } => *is_retryable && !policy.is_non_retryable(error_type.as_deref()),
            Self::TimedOut => true,
            _ => false,
        }
    }
}
