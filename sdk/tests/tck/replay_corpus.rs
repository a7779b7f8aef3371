//! Replay corpus tests
//!
//! Each corpus file holds one history and the outcome replay must produce.
//! Files named `determinism-*.json` describe changed code paths and expect a
//! violation; the others describe histories that replay cleanly.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use durable_sdk::error::{DeterminismViolationError, DurableError};
use durable_sdk::workflow::context::WorkflowContext;
use durable_sdk::{
    ActivityOptions, EventType, ExecutionId, ExecutionInfo, History, HistoryEvent, ReplayResult,
    RetryPolicy, SchedulerState, WorkflowRegistry, WorkflowReplayer,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A replay test scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayScenario {
    pub name: String,
    pub description: String,
    pub workflow_type: String,
    pub input: Value,
    pub events: Vec<ScenarioEvent>,
    pub expect: Expectation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioEvent {
    pub sequence_number: i32,
    pub event_type: EventType,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    /// COMPLETED, FAILED, CANCELLED, SUSPENDED or VIOLATION
    pub outcome: String,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub pending_activities: Option<usize>,
    #[serde(default)]
    pub violation_type: Option<String>,
    #[serde(default)]
    pub violation_sequence: Option<i32>,
}

impl ReplayScenario {
    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// Build the history, one second between events
    pub fn history(&self) -> History {
        let start = Self::start_time();
        let execution = ExecutionInfo::new(
            ExecutionId::new(format!("tck-{}", self.name), Uuid::nil()),
            self.workflow_type.clone(),
            self.input.clone(),
            start,
        );
        let events = self
            .events
            .iter()
            .map(|e| {
                HistoryEvent::new(
                    e.sequence_number,
                    e.event_type,
                    e.data.clone(),
                    start + ChronoDuration::seconds(e.sequence_number as i64),
                )
            })
            .collect();
        History::new(execution, events)
            .unwrap_or_else(|e| panic!("Invalid history in scenario {}: {}", self.name, e))
    }
}

/// Load all replay scenarios from the corpus directory
pub fn load_replay_corpus() -> Vec<ReplayScenario> {
    let corpus_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("tck")
        .join("corpus");

    let mut paths: Vec<PathBuf> = fs::read_dir(&corpus_dir)
        .expect("Failed to read corpus directory")
        .map(|entry| entry.expect("Failed to read directory entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let content =
                fs::read_to_string(path).unwrap_or_else(|_| panic!("Failed to read {:?}", path));
            serde_json::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse {:?}: {}", path, e))
        })
        .collect()
}

fn trace_options() -> ActivityOptions {
    ActivityOptions::start_to_close(Duration::from_secs(10))
}

/// Reference workflows the corpus was captured from
fn reference_replayer() -> WorkflowReplayer {
    let registry = WorkflowRegistry::new();

    registry
        .register_simple("background-check", |ctx: Arc<dyn WorkflowContext>, input: Value| async move {
            ctx.execute_activity_raw("ssn-trace", input, trace_options())
                .await
        })
        .unwrap();

    registry
        .register_simple(
            "delayed-background-check",
            |ctx: Arc<dyn WorkflowContext>, input: Value| async move {
                ctx.sleep(Duration::from_secs(60)).await?;
                ctx.execute_activity_raw("ssn-trace", input, trace_options())
                    .await
            },
        )
        .unwrap();

    registry
        .register_simple("retrying-check", |ctx: Arc<dyn WorkflowContext>, input: Value| async move {
            let policy = RetryPolicy::default().with_maximum_attempts(3);
            ctx.execute_activity_raw("ssn-trace", input, trace_options().with_retry_policy(policy))
                .await
        })
        .unwrap();

    registry
        .register_simple("approval", |ctx: Arc<dyn WorkflowContext>, _input: Value| async move {
            ctx.wait_for_signal_raw("decision").await
        })
        .unwrap();

    registry
        .register_simple("batch", |ctx: Arc<dyn WorkflowContext>, input: Value| async move {
            let options = ActivityOptions::start_to_close(Duration::from_secs(3600));
            match ctx
                .execute_activity_raw("process-batch", input.clone(), options)
                .await
            {
                Err(DurableError::Cancelled(reason)) => {
                    ctx.execute_activity_raw("release-hold", input, trace_options())
                        .await?;
                    Err(DurableError::Cancelled(reason))
                }
                other => other,
            }
        })
        .unwrap();

    WorkflowReplayer::new(Arc::new(registry), true)
}

fn violation_name(violation: &DeterminismViolationError) -> (&'static str, i32) {
    match violation {
        DeterminismViolationError::TypeMismatch { sequence, .. } => ("TypeMismatch", *sequence),
        DeterminismViolationError::ActivityTypeMismatch { sequence, .. } => {
            ("ActivityTypeMismatch", *sequence)
        }
        DeterminismViolationError::TimerIdMismatch { sequence, .. } => {
            ("TimerIdMismatch", *sequence)
        }
        DeterminismViolationError::TimerDurationMismatch { sequence, .. } => {
            ("TimerDurationMismatch", *sequence)
        }
        DeterminismViolationError::ResultMismatch { sequence, .. } => {
            ("ResultMismatch", *sequence)
        }
        DeterminismViolationError::UnexpectedCommand { sequence, .. } => {
            ("UnexpectedCommand", *sequence)
        }
        DeterminismViolationError::UnmatchedEvent { sequence, .. } => {
            ("UnmatchedEvent", *sequence)
        }
    }
}

fn check_outcome(scenario: &ReplayScenario, result: ReplayResult) {
    let expect = &scenario.expect;
    let state = match result.state {
        SchedulerState::Completed => "COMPLETED",
        SchedulerState::Failed => "FAILED",
        SchedulerState::Cancelled => "CANCELLED",
        SchedulerState::Suspended(_) => "SUSPENDED",
        SchedulerState::TimedOut => "TIMED_OUT",
        SchedulerState::NotStarted | SchedulerState::Runnable => "OTHER",
    };
    assert_eq!(state, expect.outcome, "Scenario {}: wrong outcome", scenario.name);

    if let Some(output) = &expect.output {
        assert_eq!(
            result.output.as_ref(),
            Some(output),
            "Scenario {}: wrong output",
            scenario.name
        );
    }
    let pending = expect.pending_activities.unwrap_or(0);
    assert_eq!(
        result.dispatched_activities(),
        pending,
        "Scenario {}: wrong number of new activity calls",
        scenario.name
    );
}

#[tokio::test]
async fn test_replay_corpus() {
    let scenarios = load_replay_corpus();
    assert!(!scenarios.is_empty(), "Replay corpus is empty");

    let replayer = reference_replayer();
    for scenario in &scenarios {
        let history = scenario.history();
        let replayed = replayer.replay(&scenario.workflow_type, &history).await;

        match (scenario.expect.outcome.as_str(), replayed) {
            ("VIOLATION", Err(DurableError::NonDeterminism(violation))) => {
                let (name, sequence) = violation_name(&violation);
                assert_eq!(
                    Some(name),
                    scenario.expect.violation_type.as_deref(),
                    "Scenario {}: wrong violation {:?}",
                    scenario.name,
                    violation
                );
                if let Some(expected) = scenario.expect.violation_sequence {
                    assert_eq!(sequence, expected, "Scenario {}: wrong sequence", scenario.name);
                }
            }
            ("VIOLATION", other) => {
                panic!("Scenario {}: expected a violation, got {:?}", scenario.name, other)
            }
            (_, Ok(result)) => check_outcome(scenario, result),
            (_, Err(e)) => panic!("Scenario {}: replay failed: {}", scenario.name, e),
        }
    }
}

#[test]
fn test_corpus_names_are_unique() {
    let scenarios = load_replay_corpus();
    let mut names: Vec<_> = scenarios.iter().map(|s| s.name.as_str()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), scenarios.len());
    assert!(scenarios
        .iter()
        .all(|s| s.events.first().map(|e| e.event_type) == Some(EventType::WorkflowStarted)));
}
