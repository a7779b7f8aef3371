//! Test builders for fluent history construction.

use crate::error::FailureType;
use crate::workflow::bridge::InboundEvent;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use durable_core::{
    duration_millis, ActivityFailureCause, ActivityOptions, EventType, ExecutionId, ExecutionInfo, History,
    HistoryEvent, WorkflowCommand,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Builder for histories used in replay tests.
///
/// Events are numbered in the order they are added, after the
/// `WORKFLOW_STARTED` event the builder always begins with. Timestamps start
/// at a fixed instant and move forward only through [`advance`](Self::advance)
/// and fired timers.
///
/// # Example
///
/// ```ignore
/// use durable_sdk::testing::HistoryBuilder;
/// use serde_json::json;
///
/// let history = HistoryBuilder::new("background-check", json!("555-55-5555"))
///     .timer_started("timer-1", Duration::from_secs(60))
///     .timer_fired("timer-1")
///     .activity_scheduled(0, "ssn-trace", json!("555-55-5555"))
///     .activity_completed(0, "ssn-trace", json!("pass"))
///     .completed(json!("pass"))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct HistoryBuilder {
    execution_id: ExecutionId,
    workflow_type: String,
    input: Value,
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
    events: Vec<HistoryEvent>,
    timers: HashMap<String, DateTime<Utc>>,
}

impl HistoryBuilder {
    /// Create a builder for an execution of `workflow_type`.
    ///
    /// The run id is nil so deterministic randomness is the same in every test.
    pub fn new(workflow_type: impl Into<String>, input: Value) -> Self {
        let workflow_type = workflow_type.into();
        let start_time = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        Self {
            execution_id: ExecutionId::new(format!("{}-test", workflow_type), Uuid::nil()),
            workflow_type,
            input,
            start_time,
            now: start_time,
            events: Vec::new(),
            timers: HashMap::new(),
        }
    }

    /// Set the execution id.
    pub fn execution_id(mut self, id: ExecutionId) -> Self {
        self.execution_id = id;
        self
    }

    /// Move the clock forward.
    pub fn advance(mut self, duration: Duration) -> Self {
        self.now += ChronoDuration::from_std(duration).unwrap_or_default();
        self
    }

    /// Add an event with arbitrary data.
    pub fn event(mut self, event_type: EventType, data: Value) -> Self {
        self.events
            .push(HistoryEvent::unsequenced(event_type, data, self.now));
        self
    }

    fn command(self, command: WorkflowCommand) -> Self {
        let Some(event_type) = command.event_type() else {
            return self;
        };
        let data = command.event_data();
        self.event(event_type, data)
    }

    fn inbound(mut self, inbound: InboundEvent) -> Self {
        self.events.push(inbound.into_event(self.now));
        self
    }

    /// Add an `ACTIVITY_SCHEDULED` event with a 10 second start-to-close timeout.
    pub fn activity_scheduled(self, correlation_token: u32, activity_type: &str, input: Value) -> Self {
        self.activity_scheduled_with(
            correlation_token,
            activity_type,
            input,
            ActivityOptions::start_to_close(Duration::from_secs(10)),
        )
    }

    /// Add an `ACTIVITY_SCHEDULED` event with explicit options.
    pub fn activity_scheduled_with(
        self,
        correlation_token: u32,
        activity_type: &str,
        input: Value,
        options: ActivityOptions,
    ) -> Self {
        self.command(WorkflowCommand::ScheduleActivity {
            correlation_token,
            activity_type: activity_type.to_string(),
            input,
            options,
        })
    }

    /// Add an `ACTIVITY_COMPLETED` event.
    pub fn activity_completed(self, correlation_token: u32, activity_type: &str, result: Value) -> Self {
        self.inbound(InboundEvent::ActivityCompleted {
            correlation_token,
            activity_type: activity_type.to_string(),
            result,
            attempt: 1,
        })
    }

    /// Add an `ACTIVITY_ATTEMPT_FAILED` event for a retried attempt.
    pub fn activity_attempt_failed(
        self,
        correlation_token: u32,
        activity_type: &str,
        error: &str,
        attempt: u32,
    ) -> Self {
        self.inbound(InboundEvent::ActivityAttemptFailed {
            correlation_token,
            activity_type: activity_type.to_string(),
            error: error.to_string(),
            error_type: None,
            cause: ActivityFailureCause::Application,
            attempt,
        })
    }

    /// Add an `ACTIVITY_FAILED` event.
    pub fn activity_failed(
        self,
        correlation_token: u32,
        activity_type: &str,
        error: &str,
        cause: ActivityFailureCause,
    ) -> Self {
        self.inbound(InboundEvent::ActivityFailed {
            correlation_token,
            activity_type: activity_type.to_string(),
            error: error.to_string(),
            error_type: None,
            cause,
            attempt: 1,
        })
    }

    /// Add a `TIMER_STARTED` event.
    pub fn timer_started(mut self, timer_id: &str, duration: Duration) -> Self {
        let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        let fire_at = self.now + ChronoDuration::milliseconds(duration_ms);
        self.timers.insert(timer_id.to_string(), fire_at);

        let mut data = WorkflowCommand::StartTimer {
            timer_id: timer_id.to_string(),
            duration_ms,
        }
        .event_data();
        data["fireAt"] = json!(fire_at);
        self.event(EventType::TimerStarted, data)
    }

    /// Add a `TIMER_FIRED` event, moving the clock to the timer's fire time.
    pub fn timer_fired(mut self, timer_id: &str) -> Self {
        if let Some(fire_at) = self.timers.get(timer_id) {
            self.now = self.now.max(*fire_at);
        }
        self.inbound(InboundEvent::TimerFired {
            timer_id: timer_id.to_string(),
        })
    }

    /// Add a `SIGNAL_RECEIVED` event.
    pub fn signal(self, name: &str, payload: Value) -> Self {
        self.inbound(InboundEvent::SignalReceived {
            name: name.to_string(),
            payload,
        })
    }

    /// Add a `CANCELLATION_REQUESTED` event.
    pub fn cancellation_requested(self, reason: &str) -> Self {
        self.inbound(InboundEvent::CancellationRequested {
            reason: reason.to_string(),
        })
    }

    /// Close the history with `WORKFLOW_COMPLETED`.
    pub fn completed(self, output: Value) -> Self {
        self.command(WorkflowCommand::CompleteExecution { output })
    }

    /// Close the history with `WORKFLOW_FAILED`.
    pub fn failed(self, error: &str, failure_type: FailureType) -> Self {
        self.command(WorkflowCommand::FailExecution {
            error: error.to_string(),
            failure_type: failure_type.as_str().to_string(),
        })
    }

    /// Close the history with `WORKFLOW_CANCELLED`.
    pub fn cancelled(self, reason: &str) -> Self {
        self.command(WorkflowCommand::CancelExecution {
            reason: reason.to_string(),
        })
    }

    /// Close the history with `WORKFLOW_TIMED_OUT`.
    pub fn timed_out(self, timeout: Duration) -> Self {
        self.inbound(InboundEvent::TimedOut {
            timeout_ms: duration_millis(timeout),
        })
    }

    /// Build the history.
    ///
    /// # Panics
    ///
    /// Panics if an event is added after a terminal event.
    pub fn build(self) -> History {
        let info = ExecutionInfo::new(
            self.execution_id.clone(),
            self.workflow_type.clone(),
            self.input.clone(),
            self.start_time,
        );
        let started = HistoryEvent::new(
            1,
            EventType::WorkflowStarted,
            json!({
                "workflowType": self.workflow_type,
                "workflowId": self.execution_id.workflow_id,
                "runId": self.execution_id.run_id,
                "input": self.input,
            }),
            self.start_time,
        );

        let mut history = History::new(info, vec![started]).expect("single started event");
        for event in self.events {
            let sequence = history.last_sequence() + 1;
            history
                .push(event.with_sequence_number(sequence))
                .expect("event added after the history was closed");
        }
        history
    }

    /// Build the history and serialize it as JSON.
    pub fn build_json(self) -> String {
        self.build()
            .to_json()
            .expect("history serializes to JSON")
    }
}
