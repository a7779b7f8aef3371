//! Variable Timer Workflow
//!
//! Waits before running the SSN trace. The delay is part of the workflow's
//! input, so every replay computes the same duration and matches the
//! recorded `TIMER_STARTED` event. Code that computed the delay from
//! something outside the history, such as the wall clock or a config file
//! that changed between runs, would fail replay with a timer duration
//! mismatch.

use crate::background_check::{ssn_trace_options, SSN_TRACE};
use async_trait::async_trait;
use durable_sdk::prelude::*;
use std::time::Duration;

/// Input for the delayed check
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DelayedCheckInput {
    pub ssn: String,
    pub delay_seconds: u64,
}

/// Output of the delayed check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DelayedCheckOutput {
    pub result: String,
    /// Workflow time when the trace was requested, in epoch milliseconds
    pub checked_at: i64,
}

/// Background check that waits `delay_seconds` first
pub struct VariableTimerWorkflow;

#[async_trait]
impl WorkflowDefinition for VariableTimerWorkflow {
    type Input = DelayedCheckInput;
    type Output = DelayedCheckOutput;

    fn kind(&self) -> &str {
        "variable-timer-background-check"
    }

    fn description(&self) -> Option<&str> {
        Some("Waits for the requested delay, then runs an SSN trace")
    }

    fn tags(&self) -> Vec<String> {
        vec!["tutorial".to_string(), "timer".to_string()]
    }

    async fn execute(
        &self,
        ctx: &dyn WorkflowContext,
        input: DelayedCheckInput,
    ) -> Result<DelayedCheckOutput> {
        ctx.sleep(Duration::from_secs(input.delay_seconds)).await?;
        let checked_at = ctx.current_time_millis();

        let result = ctx
            .execute_activity(SSN_TRACE, input.ssn, ssn_trace_options())
            .await?;
        Ok(DelayedCheckOutput { result, checked_at })
    }
}
