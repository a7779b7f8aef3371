//! Workflow Determinism Property Tests
//!
//! These tests verify the core determinism property:
//! **Same workflow code + same history = same commands and same output**
//!
//! ## What We Test
//!
//! 1. Replaying a history twice produces identical commands and output
//! 2. Time, randomness and UUIDs read through the context are reproducible
//! 3. Any change to a recorded activity type or timer duration is reported
//!    at the sequence number of the changed event

use durable_sdk::error::{DeterminismViolationError, DurableError};
use durable_sdk::testing::HistoryBuilder;
use durable_sdk::workflow::context::WorkflowContext;
use durable_sdk::{
    ActivityOptions, ExecutionId, History, ReplayResult, SchedulerState, WorkflowRegistry,
    WorkflowReplayer,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn options() -> ActivityOptions {
    ActivityOptions::start_to_close(Duration::from_secs(10))
}

/// Workflows used by every property
fn replayer() -> WorkflowReplayer {
    let registry = WorkflowRegistry::new();

    // Calls each activity type listed in the input, in order
    registry
        .register_simple("pipeline", |ctx: Arc<dyn WorkflowContext>, input: Value| async move {
            let steps: Vec<String> = serde_json::from_value(input)?;
            let mut results = Vec::new();
            for (index, step) in steps.iter().enumerate() {
                results.push(ctx.execute_activity_raw(step, json!(index), options()).await?);
            }
            Ok(Value::Array(results))
        })
        .unwrap();

    // Sleeps for each listed number of seconds
    registry
        .register_simple("naps", |ctx: Arc<dyn WorkflowContext>, input: Value| async move {
            let naps: Vec<u64> = serde_json::from_value(input)?;
            for seconds in &naps {
                ctx.sleep(Duration::from_secs(*seconds)).await?;
            }
            Ok(json!(naps.len()))
        })
        .unwrap();

    // Mixes context-provided time, randomness and ids into its output
    registry
        .register_simple("lottery", |ctx: Arc<dyn WorkflowContext>, _input: Value| async move {
            let ticket = ctx.random().next_int(0, 1000);
            let id = ctx.random_uuid();
            let drawn = ctx
                .execute_activity_raw("draw", json!({"ticket": ticket}), options())
                .await?;
            Ok(json!({
                "ticket": ticket,
                "id": id,
                "roll": ctx.random().next_long(0, i64::MAX),
                "drawn": drawn,
                "at": ctx.current_time_millis(),
            }))
        })
        .unwrap();

    WorkflowReplayer::new(Arc::new(registry), true)
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn replay(workflow_type: &str, history: &History) -> Result<ReplayResult, DurableError> {
    block_on(replayer().replay(workflow_type, history))
}

fn pipeline_history(steps: &[String], run_id: Uuid) -> History {
    let mut builder = HistoryBuilder::new("pipeline", json!(steps))
        .execution_id(ExecutionId::new("pipeline-prop", run_id));
    for (token, step) in steps.iter().enumerate() {
        builder = builder
            .activity_scheduled(token as u32, step, json!(token))
            .advance(Duration::from_millis(250))
            .activity_completed(token as u32, step, json!(format!("{}-done", step)));
    }
    let output: Vec<String> = steps.iter().map(|s| format!("{}-done", s)).collect();
    builder.completed(json!(output)).build()
}

fn naps_history(naps: &[u64]) -> History {
    let mut builder = HistoryBuilder::new("naps", json!(naps));
    for (index, seconds) in naps.iter().enumerate() {
        let timer_id = format!("timer-{}", index + 1);
        builder = builder
            .timer_started(&timer_id, Duration::from_secs(*seconds))
            .timer_fired(&timer_id);
    }
    builder.completed(json!(naps.len())).build()
}

fn arb_steps() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{3,8}", 1..8)
}

proptest! {
    /// Property: Replaying the same history twice gives identical results
    #[test]
    fn replay_is_repeatable(steps in arb_steps(), run_id in any::<u128>()) {
        let history = pipeline_history(&steps, Uuid::from_u128(run_id));

        let first = replay("pipeline", &history).unwrap();
        let second = replay("pipeline", &history).unwrap();

        prop_assert_eq!(&first.state, &SchedulerState::Completed);
        prop_assert_eq!(&first.commands, &second.commands);
        prop_assert_eq!(&first.output, &second.output);
        prop_assert_eq!(first.dispatched_activities(), 0);
        prop_assert_eq!(first.commands.len(), steps.len() + 1);
    }

    /// Property: Context time, randomness and ids are reproducible per run id
    #[test]
    fn context_values_are_reproducible(run_id in any::<u128>(), drawn in any::<i64>()) {
        let history = HistoryBuilder::new("lottery", json!(null))
            .execution_id(ExecutionId::new("lottery-prop", Uuid::from_u128(run_id)))
            .activity_scheduled(0, "draw", json!(null))
            .advance(Duration::from_secs(3))
            .activity_completed(0, "draw", json!(drawn))
            .build();

        let first = replay("lottery", &history).unwrap();
        let second = replay("lottery", &history).unwrap();

        let output = first.output.clone().unwrap();
        prop_assert_eq!(&first.output, &second.output);
        prop_assert_eq!(&output["drawn"], &json!(drawn));
        let ticket = output["ticket"].as_i64().unwrap();
        prop_assert!((0..1000).contains(&ticket));
        // Time is the timestamp of the last event the code observed
        prop_assert_eq!(
            output["at"].as_i64().unwrap(),
            history.events()[2].timestamp().timestamp_millis()
        );
    }

    /// Property: Renaming any one recorded activity is reported at its event
    #[test]
    fn detects_changed_activity_type(
        steps in arb_steps(),
        index in any::<prop::sample::Index>(),
        replacement in "[A-Z]{3,8}",
    ) {
        let changed = index.index(steps.len());
        let mut recorded = steps.clone();
        recorded[changed] = replacement;

        // The code reads the original steps from the input
        let recorded_history = pipeline_history(&recorded, Uuid::nil());
        let mut execution = recorded_history.execution().clone();
        execution.input = json!(steps);
        let history = History::new(execution, recorded_history.into_events()).unwrap();

        match replay("pipeline", &history) {
            Err(DurableError::NonDeterminism(DeterminismViolationError::ActivityTypeMismatch {
                sequence,
                expected,
                actual,
            })) => {
                // Started, then a scheduled/completed pair per step
                prop_assert_eq!(sequence, 2 + 2 * changed as i32);
                prop_assert_eq!(&expected, &recorded[changed]);
                prop_assert_eq!(&actual, &steps[changed]);
            }
            other => prop_assert!(false, "expected activity type mismatch, got {:?}", other),
        }
    }

    /// Property: Changing any one recorded timer duration is reported
    #[test]
    fn detects_changed_timer_duration(
        naps in prop::collection::vec(1u64..3600, 1..6),
        index in any::<prop::sample::Index>(),
        delta in 1u64..600,
    ) {
        let changed = index.index(naps.len());
        let mut recorded = naps.clone();
        recorded[changed] += delta;

        let recorded_history = naps_history(&recorded);
        let mut execution = recorded_history.execution().clone();
        execution.input = json!(naps);
        let history = History::new(execution, recorded_history.into_events()).unwrap();

        match replay("naps", &history) {
            Err(DurableError::NonDeterminism(DeterminismViolationError::TimerDurationMismatch {
                timer_id,
                expected_ms,
                actual_ms,
                ..
            })) => {
                prop_assert_eq!(timer_id, format!("timer-{}", changed + 1));
                prop_assert_eq!(expected_ms, (recorded[changed] * 1000) as i64);
                prop_assert_eq!(actual_ms, (naps[changed] * 1000) as i64);
            }
            other => prop_assert!(false, "expected timer duration mismatch, got {:?}", other),
        }
    }
}
