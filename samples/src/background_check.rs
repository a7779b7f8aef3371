//! Background Check Workflow
//!
//! The smallest useful workflow: one activity call whose result is the
//! workflow's result. Once the SSN trace completes, the recorded result is
//! what every later replay sees, even if the trace service would now answer
//! differently.

use async_trait::async_trait;
use durable_sdk::prelude::*;
use std::time::Duration;
use tracing::info;

/// Activity type of the SSN trace
pub const SSN_TRACE: &str = "ssn-trace";

/// Options every sample uses for the SSN trace
pub fn ssn_trace_options() -> ActivityOptions {
    ActivityOptions::start_to_close(Duration::from_secs(10)).with_retry_policy(
        RetryPolicy::default()
            .with_maximum_attempts(3)
            .with_initial_interval(Duration::from_millis(500))
            .with_non_retryable_error_type("INVALID_SSN"),
    )
}

/// Looks up an SSN with the trace provider.
///
/// Numbers in the never-issued `000` area fail without retries.
pub struct SsnTraceActivity;

#[async_trait]
impl ActivityDefinition for SsnTraceActivity {
    type Input = String;
    type Output = String;

    fn kind(&self) -> &str {
        SSN_TRACE
    }

    fn description(&self) -> Option<&str> {
        Some("Traces an SSN and reports pass or fail")
    }

    async fn execute(
        &self,
        ssn: String,
        ctx: &ActivityContext,
    ) -> std::result::Result<String, ActivityError> {
        info!(
            workflow_id = %ctx.workflow_id(),
            attempt = ctx.attempt(),
            "Running SSN trace"
        );
        if ssn.starts_with("000") {
            return Err(ActivityError::application(format!("SSN {} was never issued", ssn))
                .with_error_type("INVALID_SSN"));
        }
        Ok("pass".to_string())
    }
}

/// Workflow that runs a single SSN trace
pub struct BackgroundCheckWorkflow;

#[async_trait]
impl WorkflowDefinition for BackgroundCheckWorkflow {
    type Input = String;
    type Output = String;

    fn kind(&self) -> &str {
        "background-check"
    }

    fn name(&self) -> &str {
        "Background Check"
    }

    fn description(&self) -> Option<&str> {
        Some("Runs an SSN trace and returns its result")
    }

    fn tags(&self) -> Vec<String> {
        vec!["tutorial".to_string()]
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, ssn: String) -> Result<String> {
        ctx.execute_activity(SSN_TRACE, ssn, ssn_trace_options())
            .await
    }
}
