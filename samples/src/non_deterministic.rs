//! Non-Deterministic Background Check
//!
//! **Do not write workflows like this.** The branch is picked with
//! `rand::random`, which reads live randomness instead of the execution's
//! seeded source. Each re-run may take the other branch, and the engine
//! reports the divergence as a non-determinism fault, either during the
//! live run or when the recorded history is replayed later.
//!
//! The deterministic version draws from `ctx.random()`, which is seeded
//! from the run id and gives the same answer on every re-run.

use crate::background_check::{ssn_trace_options, SSN_TRACE};
use async_trait::async_trait;
use durable_sdk::prelude::*;
use std::time::Duration;

/// Activity type of the credit check
pub const CREDIT_CHECK: &str = "credit-check";

/// Credit check used by the second branch
pub struct CreditCheckActivity;

#[async_trait]
impl ActivityDefinition for CreditCheckActivity {
    type Input = String;
    type Output = String;

    fn kind(&self) -> &str {
        CREDIT_CHECK
    }

    async fn execute(
        &self,
        _ssn: String,
        _ctx: &ActivityContext,
    ) -> std::result::Result<String, ActivityError> {
        Ok("approved".to_string())
    }
}

/// Picks a check at random, the wrong way
pub struct NonDeterministicWorkflow;

#[async_trait]
impl WorkflowDefinition for NonDeterministicWorkflow {
    type Input = String;
    type Output = String;

    fn kind(&self) -> &str {
        "non-deterministic-background-check"
    }

    fn description(&self) -> Option<&str> {
        Some("Anti-pattern: branches on live randomness")
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, ssn: String) -> Result<String> {
        if rand::random::<bool>() {
            ctx.execute_activity(SSN_TRACE, ssn, ssn_trace_options())
                .await
        } else {
            ctx.sleep(Duration::from_secs(1)).await?;
            ctx.execute_activity(CREDIT_CHECK, ssn, ssn_trace_options())
                .await
        }
    }
}

/// The same choice made through the execution's seeded random source
pub struct SeededChoiceWorkflow;

#[async_trait]
impl WorkflowDefinition for SeededChoiceWorkflow {
    type Input = String;
    type Output = String;

    fn kind(&self) -> &str {
        "seeded-background-check"
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, ssn: String) -> Result<String> {
        if ctx.random().next_bool() {
            ctx.execute_activity(SSN_TRACE, ssn, ssn_trace_options())
                .await
        } else {
            ctx.sleep(Duration::from_secs(1)).await?;
            ctx.execute_activity(CREDIT_CHECK, ssn, ssn_trace_options())
                .await
        }
    }
}
