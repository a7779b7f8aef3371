//! Scheduler Property Tests
//!
//! These tests use proptest to verify invariants of driving workflow code
//! against partial, reordered and cancelled histories.

use durable_sdk::testing::HistoryBuilder;
use durable_sdk::workflow::context::WorkflowContext;
use durable_sdk::{
    ActivityOptions, DurableError, History, ReplayResult, SchedulerState, WorkflowCommand,
    WorkflowRegistry, WorkflowReplayer,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn replayer() -> WorkflowReplayer {
    let registry = WorkflowRegistry::new();

    registry
        .register_simple("chain", |ctx: Arc<dyn WorkflowContext>, input: Value| async move {
            let length = input.as_u64().unwrap_or_default();
            let mut total = 0;
            for step in 0..length {
                let value = ctx
                    .execute_activity_raw(
                        "add",
                        json!(step),
                        ActivityOptions::start_to_close(Duration::from_secs(5)),
                    )
                    .await?;
                total += value.as_i64().unwrap_or_default();
            }
            Ok(json!(total))
        })
        .unwrap();

    registry
        .register_simple("collector", |ctx: Arc<dyn WorkflowContext>, input: Value| async move {
            let expected = input.as_u64().unwrap_or_default();
            let mut seen = Vec::new();
            for _ in 0..expected {
                let signal = ctx.next_signal().await?;
                seen.push(json!([signal.name, signal.payload]));
            }
            Ok(Value::Array(seen))
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

/// Builder for a chain run with `completed` of `length` steps recorded
fn chain_builder(length: usize, completed: usize) -> HistoryBuilder {
    let mut builder = HistoryBuilder::new("chain", json!(length));
    for step in 0..completed {
        builder = builder
            .activity_scheduled(step as u32, "add", json!(step))
            .advance(Duration::from_secs(1))
            .activity_completed(step as u32, "add", json!(step * 10));
    }
    builder
}

fn chain_total(steps: usize) -> i64 {
    (0..steps as i64).map(|s| s * 10).sum()
}

/// Length of a chain plus how many of its steps are recorded
fn arb_chain() -> impl Strategy<Value = (usize, usize)> {
    (1usize..8).prop_flat_map(|length| (Just(length), 0..=length))
}

proptest! {
    /// Property: Any prefix of a run replays without a violation and ends
    /// with exactly one decision past the recorded events
    #[test]
    fn prefix_replays_to_frontier((length, completed) in arb_chain()) {
        let history = chain_builder(length, completed).build();
        let result = replay("chain", &history).unwrap();

        prop_assert_eq!(result.commands.len(), completed + 1);
        prop_assert_eq!(result.pending_commands.len(), 1);

        if completed == length {
            prop_assert_eq!(&result.state, &SchedulerState::Completed);
            prop_assert_eq!(&result.output, &Some(json!(chain_total(length))));
            prop_assert_eq!(result.dispatched_activities(), 0);
        } else {
            prop_assert!(matches!(result.state, SchedulerState::Suspended(_)));
            match &result.pending_commands[0] {
                WorkflowCommand::ScheduleActivity { correlation_token, input, .. } => {
                    prop_assert_eq!(*correlation_token as usize, completed);
                    prop_assert_eq!(input, &json!(completed));
                }
                other => prop_assert!(false, "unexpected pending command {:?}", other),
            }
        }
    }

    /// Property: An in-flight call is waited on, never dispatched twice
    #[test]
    fn scheduled_call_is_not_reissued((length, completed) in arb_chain()) {
        prop_assume!(completed < length);
        let history = chain_builder(length, completed)
            .activity_scheduled(completed as u32, "add", json!(completed))
            .build();

        let result = replay("chain", &history).unwrap();
        prop_assert!(matches!(result.state, SchedulerState::Suspended(_)));
        prop_assert_eq!(result.dispatched_activities(), 0);
        prop_assert!(result.pending_commands.is_empty());
    }

    /// Property: Delivery order of history events does not change the replay
    #[test]
    fn reordered_delivery_replays_identically(
        (length, completed) in arb_chain(),
        seed in any::<u64>(),
    ) {
        let history = chain_builder(length, completed).build();
        let expected = replay("chain", &history).unwrap();

        let execution = history.execution().clone();
        let mut events = history.into_events();
        // Rotate then interleave so every seed gives a different order
        let len = events.len();
        events.rotate_left((seed as usize) % len);
        if seed % 2 == 0 {
            events.reverse();
        }

        let result = block_on(replayer().replay_events(execution, events)).unwrap();
        prop_assert_eq!(result.state, expected.state);
        prop_assert_eq!(result.commands, expected.commands);
        prop_assert_eq!(result.output, expected.output);
    }

    /// Property: Cancellation recorded mid-run ends the code at its next
    /// new decision, without dispatching it
    #[test]
    fn cancellation_stops_before_next_call((length, completed) in arb_chain()) {
        prop_assume!(completed < length);
        let history = chain_builder(length, completed)
            .cancellation_requested("stop")
            .build();

        let result = replay("chain", &history).unwrap();
        prop_assert_eq!(&result.state, &SchedulerState::Cancelled);
        prop_assert_eq!(result.dispatched_activities(), 0);
        prop_assert_eq!(
            result.pending_commands,
            vec![WorkflowCommand::CancelExecution { reason: "stop".to_string() }]
        );
    }

    /// Property: Signals are consumed once each, in recorded order
    #[test]
    fn signals_consumed_in_order(
        signals in prop::collection::vec(("[a-z]{1,6}", any::<i32>()), 0..10),
        extra in 0usize..3,
    ) {
        let mut builder = HistoryBuilder::new("collector", json!(signals.len() + extra));
        for (name, payload) in &signals {
            builder = builder.signal(name, json!(payload));
        }
        let result = replay("collector", &builder.build()).unwrap();

        if extra == 0 {
            let expected: Vec<Value> = signals
                .iter()
                .map(|(name, payload)| json!([name, payload]))
                .collect();
            prop_assert_eq!(result.state, SchedulerState::Completed);
            prop_assert_eq!(result.output, Some(Value::Array(expected)));
        } else {
            prop_assert!(matches!(result.state, SchedulerState::Suspended(_)));
            prop_assert!(result.output.is_none());
        }
    }
}
