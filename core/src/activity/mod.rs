//! Activity module - options, retry policy and attempt outcomes

pub mod execution;

pub use execution::{
    calculate_backoff, duration_millis, should_retry, ActivityExecutionResult, ActivityFailureCause,
    ActivityOptions, RetryPolicy,
};
