//! Trip Booking Saga
//!
//! Books a car, a hotel and a flight. When a booking fails for good, the
//! bookings already made are cancelled in reverse order and the workflow
//! completes with a summary instead of failing. Each compensation is an
//! ordinary activity call, so a crash during compensation resumes where it
//! stopped.

use async_trait::async_trait;
use durable_sdk::prelude::*;
use std::time::Duration;
use tracing::{info, warn};

/// One step of the saga: the booking activity and the activity that undoes it
#[derive(Debug, Clone, Copy)]
struct SagaStep {
    book: &'static str,
    cancel: &'static str,
}

const STEPS: [SagaStep; 3] = [
    SagaStep {
        book: "book-car",
        cancel: "cancel-car",
    },
    SagaStep {
        book: "book-hotel",
        cancel: "cancel-hotel",
    },
    SagaStep {
        book: "book-flight",
        cancel: "cancel-flight",
    },
];

/// Input for the trip booking saga
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub trip_id: String,
    /// Booking activity to fail, for demonstrating compensation
    #[serde(default)]
    pub fail_at: Option<String>,
}

/// Request sent to every booking and cancellation activity
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub trip_id: String,
    #[serde(default)]
    pub fail: bool,
}

/// Outcome of the saga
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub trip_id: String,
    pub booked: bool,
    pub confirmations: Vec<String>,
    pub compensations: Vec<String>,
    pub failure: Option<String>,
}

/// Booking or cancellation with a supplier.
///
/// One type serves all six activities; the kind picks which.
pub struct SupplierActivity {
    kind: &'static str,
}

impl SupplierActivity {
    /// Every booking and cancellation activity the saga uses
    pub fn all() -> Vec<SupplierActivity> {
        STEPS
            .iter()
            .flat_map(|step| [step.book, step.cancel])
            .map(|kind| SupplierActivity { kind })
            .collect()
    }
}

#[async_trait]
impl ActivityDefinition for SupplierActivity {
    type Input = BookingRequest;
    type Output = String;

    fn kind(&self) -> &str {
        self.kind
    }

    async fn execute(
        &self,
        request: BookingRequest,
        _ctx: &ActivityContext,
    ) -> std::result::Result<String, ActivityError> {
        if request.fail {
            return Err(ActivityError::non_retryable(format!(
                "{} rejected trip {}",
                self.kind, request.trip_id
            )));
        }
        Ok(format!("{}:{}", self.kind, request.trip_id))
    }
}

fn booking_options() -> ActivityOptions {
    ActivityOptions::start_to_close(Duration::from_secs(30))
        .with_retry_policy(RetryPolicy::default().with_maximum_attempts(3))
}

/// Saga over the three bookings
pub struct TripBookingWorkflow;

#[async_trait]
impl WorkflowDefinition for TripBookingWorkflow {
    type Input = TripRequest;
    type Output = TripSummary;

    fn kind(&self) -> &str {
        "trip-booking"
    }

    fn description(&self) -> Option<&str> {
        Some("Books car, hotel and flight, compensating on failure")
    }

    fn tags(&self) -> Vec<String> {
        vec!["saga".to_string()]
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, input: TripRequest) -> Result<TripSummary> {
        let mut confirmations = Vec::new();
        let mut completed: Vec<SagaStep> = Vec::new();

        for step in STEPS {
            let request = BookingRequest {
                trip_id: input.trip_id.clone(),
                fail: input.fail_at.as_deref() == Some(step.book),
            };
            match ctx
                .execute_activity::<_, String>(step.book, request, booking_options())
                .await
            {
                Ok(confirmation) => {
                    if !ctx.is_replaying() {
                        info!(trip_id = %input.trip_id, confirmation = %confirmation, "Booked");
                    }
                    confirmations.push(confirmation);
                    completed.push(step);
                }
                Err(DurableError::ActivityFailed { message, .. }) => {
                    warn!(trip_id = %input.trip_id, step = step.book, error = %message, "Booking failed, compensating");
                    let compensations = compensate(ctx, &input.trip_id, &completed).await?;
                    return Ok(TripSummary {
                        trip_id: input.trip_id,
                        booked: false,
                        confirmations,
                        compensations,
                        failure: Some(message),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(TripSummary {
            trip_id: input.trip_id,
            booked: true,
            confirmations,
            compensations: Vec::new(),
            failure: None,
        })
    }
}

/// Undo completed steps, most recent first
async fn compensate(
    ctx: &dyn WorkflowContext,
    trip_id: &str,
    completed: &[SagaStep],
) -> Result<Vec<String>> {
    let mut undone = Vec::new();
    for step in completed.iter().rev() {
        let request = BookingRequest {
            trip_id: trip_id.to_string(),
            fail: false,
        };
        ctx.execute_activity::<_, String>(step.cancel, request, booking_options())
            .await?;
        undone.push(step.cancel.to_string());
    }
    Ok(undone)
}
