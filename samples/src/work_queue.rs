//! Work Queue Workflow
//!
//! A long-lived workflow fed by signals. Items are added with `add`,
//! marked done with `complete` and the loop ends on `shutdown`. The
//! `queue` and `completed` queries expose the current state without
//! touching the history.

use async_trait::async_trait;
use durable_sdk::prelude::*;
use tracing::debug;

/// Signal that adds an item
pub const ADD: &str = "add";
/// Signal that completes an item by id
pub const COMPLETE: &str = "complete";
/// Signal that ends the workflow
pub const SHUTDOWN: &str = "shutdown";

/// Item waiting in the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkItem {
    pub id: String,
    pub description: String,
}

/// What the queue looked like at shutdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub completed: Vec<String>,
    pub abandoned: Vec<WorkItem>,
}

pub struct WorkQueueWorkflow;

impl WorkQueueWorkflow {
    fn publish(
        ctx: &dyn WorkflowContext,
        queue: &[WorkItem],
        completed: &[String],
    ) -> Result<()> {
        ctx.set_query_state("queue", &queue)?;
        ctx.set_query_state("completed", &completed)
    }
}

#[async_trait]
impl WorkflowDefinition for WorkQueueWorkflow {
    type Input = ();
    type Output = QueueSummary;

    fn kind(&self) -> &str {
        "work-queue"
    }

    fn description(&self) -> Option<&str> {
        Some("Signal-driven work queue with query access")
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, _input: ()) -> Result<QueueSummary> {
        let mut queue: Vec<WorkItem> = Vec::new();
        let mut completed: Vec<String> = Vec::new();
        Self::publish(ctx, &queue, &completed)?;

        loop {
            let signal = ctx.next_signal().await?;
            match signal.name.as_str() {
                ADD => queue.push(signal.payload_as()?),
                COMPLETE => {
                    let id: String = signal.payload_as()?;
                    match queue.iter().position(|item| item.id == id) {
                        Some(index) => {
                            queue.remove(index);
                            completed.push(id);
                        }
                        None => debug!(item = %id, "Ignoring completion of unknown item"),
                    }
                }
                SHUTDOWN => break,
                other => {
                    return Err(DurableError::NonRetryable(format!(
                        "unknown signal '{}'",
                        other
                    )))
                }
            }
            Self::publish(ctx, &queue, &completed)?;
        }

        Ok(QueueSummary {
            completed,
            abandoned: queue,
        })
    }
}
