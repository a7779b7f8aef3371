//! Test workflow definitions for E2E tests

use async_trait::async_trait;
use durable_sdk::error::{DurableError, Result};
use durable_sdk::workflow::context::{WorkflowContext, WorkflowContextExt};
use durable_sdk::workflow::definition::WorkflowDefinition;
use durable_sdk::ActivityOptions;
use durable_sdk::RetryPolicy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

fn short_activity() -> ActivityOptions {
    ActivityOptions::start_to_close(Duration::from_secs(10))
}

/// Runs a single SSN trace on the applicant.
pub struct BackgroundCheckWorkflow;

#[async_trait]
impl WorkflowDefinition for BackgroundCheckWorkflow {
    type Input = String;
    type Output = String;

    fn kind(&self) -> &str {
        "background-check"
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, ssn: String) -> Result<String> {
        ctx.execute_activity("ssn-trace", ssn, short_activity()).await
    }
}

/// Waits a minute before running the SSN trace.
pub struct DelayedBackgroundCheckWorkflow;

#[async_trait]
impl WorkflowDefinition for DelayedBackgroundCheckWorkflow {
    type Input = String;
    type Output = String;

    fn kind(&self) -> &str {
        "delayed-background-check"
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, ssn: String) -> Result<String> {
        ctx.sleep(Duration::from_secs(60)).await?;
        ctx.execute_activity("ssn-trace", ssn, short_activity()).await
    }
}

/// Calls an activity that needs a few attempts.
pub struct FlakyWorkflow;

#[async_trait]
impl WorkflowDefinition for FlakyWorkflow {
    type Input = Value;
    type Output = Value;

    fn kind(&self) -> &str {
        "flaky-workflow"
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, input: Value) -> Result<Value> {
        let policy = RetryPolicy::default()
            .with_maximum_attempts(3)
            .with_initial_interval(Duration::from_secs(1));
        ctx.execute_activity_raw("flaky", input, short_activity().with_retry_policy(policy))
            .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub trip_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub booked: bool,
    pub confirmations: Vec<String>,
    pub compensated: Vec<String>,
    pub error: Option<String>,
}

/// Books car, hotel and flight; undoes completed bookings in reverse on failure.
pub struct TripBookingWorkflow;

const TRIP_STEPS: [(&str, &str); 3] = [
    ("book-car", "cancel-car"),
    ("book-hotel", "cancel-hotel"),
    ("book-flight", "cancel-flight"),
];

#[async_trait]
impl WorkflowDefinition for TripBookingWorkflow {
    type Input = TripRequest;
    type Output = BookingSummary;

    fn kind(&self) -> &str {
        "trip-booking"
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, input: TripRequest) -> Result<BookingSummary> {
        let mut compensations = Vec::new();
        let mut confirmations = Vec::new();

        for (book, cancel) in TRIP_STEPS {
            match ctx
                .execute_activity::<_, String>(book, &input.trip_id, short_activity())
                .await
            {
                Ok(confirmation) => {
                    confirmations.push(confirmation);
                    compensations.push(cancel);
                }
                Err(DurableError::ActivityFailed { message, .. }) => {
                    let mut compensated = Vec::new();
                    for cancel in compensations.into_iter().rev() {
                        ctx.execute_activity_raw(cancel, json!(input.trip_id), short_activity())
                            .await?;
                        compensated.push(cancel.to_string());
                    }
                    return Ok(BookingSummary {
                        booked: false,
                        confirmations,
                        compensated,
                        error: Some(message),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(BookingSummary {
            booked: true,
            confirmations,
            compensated: Vec::new(),
            error: None,
        })
    }
}

/// Collects work items from signals until told to stop.
///
/// Publishes the queue under the `items` query after every change.
pub struct WorkQueueWorkflow;

#[async_trait]
impl WorkflowDefinition for WorkQueueWorkflow {
    type Input = Value;
    type Output = Vec<String>;

    fn kind(&self) -> &str {
        "work-queue"
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, _input: Value) -> Result<Vec<String>> {
        let mut items: Vec<String> = Vec::new();
        ctx.set_query_state("items", &items)?;

        loop {
            let signal = ctx.next_signal().await?;
            match signal.name.as_str() {
                "add" => items.push(signal.payload_as()?),
                "take" => {
                    if !items.is_empty() {
                        items.remove(0);
                    }
                }
                "stop" => break,
                other => {
                    return Err(DurableError::NonRetryable(format!(
                        "unknown signal '{}'",
                        other
                    )))
                }
            }
            ctx.set_query_state("items", &items)?;
        }

        Ok(items)
    }
}

/// Processes a batch; releases its hold when cancelled.
pub struct BatchWorkflow;

#[async_trait]
impl WorkflowDefinition for BatchWorkflow {
    type Input = String;
    type Output = String;

    fn kind(&self) -> &str {
        "batch"
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, batch: String) -> Result<String> {
        let options = ActivityOptions::start_to_close(Duration::from_secs(3600));
        match ctx.execute_activity("process-batch", &batch, options).await {
            Err(DurableError::Cancelled(reason)) => {
                ctx.execute_activity_raw("release-hold", json!(batch), short_activity())
                    .await?;
                Err(DurableError::Cancelled(reason))
            }
            other => other,
        }
    }
}

/// Waits for a signal that may never come.
pub struct ApprovalWorkflow;

#[async_trait]
impl WorkflowDefinition for ApprovalWorkflow {
    type Input = Value;
    type Output = bool;

    fn kind(&self) -> &str {
        "approval"
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, _input: Value) -> Result<bool> {
        ctx.set_query_state("status", &"pending")?;
        ctx.wait_for_signal("decision").await
    }

    fn cancellable(&self) -> bool {
        false
    }
}

/// Runs two activities in sequence.
pub struct TwoStepWorkflow;

#[async_trait]
impl WorkflowDefinition for TwoStepWorkflow {
    type Input = Value;
    type Output = Vec<Value>;

    fn kind(&self) -> &str {
        "two-step"
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, input: Value) -> Result<Vec<Value>> {
        let first = ctx
            .execute_activity_raw("step-one", input.clone(), short_activity())
            .await?;
        let second = ctx
            .execute_activity_raw("step-two", input, ActivityOptions::start_to_close(Duration::from_secs(600)))
            .await?;
        Ok(vec![first, second])
    }
}

/// Sleeps for a day unless the execution timeout ends it first.
pub struct SlowWorkflow;

#[async_trait]
impl WorkflowDefinition for SlowWorkflow {
    type Input = Value;
    type Output = Value;

    fn kind(&self) -> &str {
        "slow"
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, input: Value) -> Result<Value> {
        ctx.sleep(Duration::from_secs(86_400)).await?;
        Ok(input)
    }

    fn timeout_seconds(&self) -> Option<u64> {
        Some(120)
    }
}
