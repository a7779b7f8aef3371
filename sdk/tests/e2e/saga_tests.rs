//! Saga tests: completed steps are compensated in reverse order when a
//! later step fails.

use crate::engine;
use crate::fixtures::{BookingSummary, TripRequest};
use durable_sdk::testing::MockActivityExecutor;
use durable_sdk::{ActivityError, EventType};
use serde_json::json;

fn booking_executor() -> MockActivityExecutor {
    MockActivityExecutor::new()
        .with_result("book-car", json!("car-1"))
        .with_result("book-hotel", json!("hotel-1"))
        .with_result("cancel-car", json!("ok"))
        .with_result("cancel-hotel", json!("ok"))
        .with_result("cancel-flight", json!("ok"))
}

fn trip() -> TripRequest {
    TripRequest {
        trip_id: "trip-7".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_all_bookings_succeed() {
    let executor = booking_executor().with_result("book-flight", json!("flight-1"));
    let engine = engine(executor.clone());

    let id = engine.start("trip-booking", trip()).await.unwrap();
    let summary: BookingSummary = engine.get_result_as(&id).await.unwrap();

    assert!(summary.booked);
    assert_eq!(summary.confirmations, vec!["car-1", "hotel-1", "flight-1"]);
    assert!(summary.compensated.is_empty());
    assert_eq!(executor.call_count("cancel-car"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_booking_compensates_in_reverse() {
    let executor =
        booking_executor().with_error("book-flight", ActivityError::non_retryable("no seats"));
    let engine = engine(executor.clone());

    let id = engine.start("trip-booking", trip()).await.unwrap();
    let summary: BookingSummary = engine.get_result_as(&id).await.unwrap();

    assert!(!summary.booked);
    assert_eq!(summary.confirmations, vec!["car-1", "hotel-1"]);
    assert_eq!(summary.compensated, vec!["cancel-hotel", "cancel-car"]);
    assert!(summary.error.unwrap().contains("no seats"));

    let order: Vec<String> = executor
        .calls()
        .into_iter()
        .map(|c| c.activity_type)
        .collect();
    assert_eq!(
        order,
        vec!["book-car", "book-hotel", "book-flight", "cancel-hotel", "cancel-car"]
    );
    assert!(executor.calls().iter().all(|c| c.input == json!("trip-7")));

    // The saga handled the failure, so the execution itself completed
    let history = engine.history(&id).await.unwrap();
    assert_eq!(
        history.terminal_event().unwrap().event_type(),
        EventType::WorkflowCompleted
    );
    assert_eq!(history.events_of_type(EventType::ActivityFailed).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_compensation_replays_without_dispatch() {
    let executor =
        booking_executor().with_error("book-flight", ActivityError::non_retryable("no seats"));
    let engine = engine(executor.clone());

    let id = engine.start("trip-booking", trip()).await.unwrap();
    let output = engine.get_result(&id).await.unwrap();
    let history = engine.history(&id).await.unwrap();

    let result = engine.replayer().replay("trip-booking", &history).await.unwrap();
    assert_eq!(result.output, Some(output));
    assert_eq!(result.dispatched_activities(), 0);
    assert_eq!(executor.total_calls(), 5);
}
