//! Command/event bridge for one execution
//!
//! The bridge is the single writer of an execution's history. It turns the
//! commands produced by a drive into recorded events, hands live work to the
//! activity gateway and timer service, and records completions, signals and
//! cancellation as they arrive.

use crate::error::Result;
use crate::worker::timer::Clock;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use durable_core::{
    ActivityFailureCause, ActivityOptions, EventLookup, EventType, HistoryEvent, HistoryStore,
    History, WorkflowCommand,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// How an execution's pending work is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Commands are recorded and dispatched to the gateway and timer service
    Live,
    /// Events come from a stored history; nothing is recorded or dispatched
    Replay,
}

/// Activity call handed to the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDispatch {
    pub correlation_token: u32,
    pub activity_type: String,
    pub input: Value,
    pub options: ActivityOptions,
    /// Attempt to start with (greater than 1 when recovering after retries)
    pub attempt: u32,
    /// Timestamp of the `ACTIVITY_SCHEDULED` event
    pub scheduled_at: DateTime<Utc>,
}

/// Timer handed to the timer service
#[derive(Debug, Clone, PartialEq)]
pub struct TimerDispatch {
    pub timer_id: String,
    pub fire_at: DateTime<Utc>,
}

/// Live work produced by recording commands
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Activity(ActivityDispatch),
    Timer(TimerDispatch),
}

/// Something that happened outside the workflow code and must be recorded
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ActivityCompleted {
        correlation_token: u32,
        activity_type: String,
        result: Value,
        attempt: u32,
    },
    /// A failed attempt that will be retried
    ActivityAttemptFailed {
        correlation_token: u32,
        activity_type: String,
        error: String,
        error_type: Option<String>,
        cause: ActivityFailureCause,
        attempt: u32,
    },
    ActivityFailed {
        correlation_token: u32,
        activity_type: String,
        error: String,
        error_type: Option<String>,
        cause: ActivityFailureCause,
        attempt: u32,
    },
    TimerFired {
        timer_id: String,
    },
    SignalReceived {
        name: String,
        payload: Value,
    },
    CancellationRequested {
        reason: String,
    },
    TimedOut {
        timeout_ms: u64,
    },
}

impl InboundEvent {
    /// Event type this is recorded as
    pub fn event_type(&self) -> EventType {
        match self {
            Self::ActivityCompleted { .. } => EventType::ActivityCompleted,
            Self::ActivityAttemptFailed { .. } => EventType::ActivityAttemptFailed,
            Self::ActivityFailed { .. } => EventType::ActivityFailed,
            Self::TimerFired { .. } => EventType::TimerFired,
            Self::SignalReceived { .. } => EventType::SignalReceived,
            Self::CancellationRequested { .. } => EventType::CancellationRequested,
            Self::TimedOut { .. } => EventType::WorkflowTimedOut,
        }
    }

    /// Build the unsequenced event to append
    pub fn into_event(self, timestamp: DateTime<Utc>) -> HistoryEvent {
        let event_type = self.event_type();
        let data = match self {
            Self::ActivityCompleted {
                correlation_token,
                activity_type,
                result,
                attempt,
            } => json!({
                "correlationToken": correlation_token,
                "activityType": activity_type,
                "result": result,
                "attempt": attempt,
            }),
            Self::ActivityAttemptFailed {
                correlation_token,
                activity_type,
                error,
                error_type,
                cause,
                attempt,
            }
            | Self::ActivityFailed {
                correlation_token,
                activity_type,
                error,
                error_type,
                cause,
                attempt,
            } => json!({
                "correlationToken": correlation_token,
                "activityType": activity_type,
                "error": error,
                "errorType": error_type,
                "cause": cause.as_str(),
                "attempt": attempt,
            }),
            Self::TimerFired { timer_id } => json!({ "timerId": timer_id }),
            Self::SignalReceived { name, payload } => json!({
                "signalName": name,
                "payload": payload,
            }),
            Self::CancellationRequested { reason } => json!({ "reason": reason }),
            Self::TimedOut { timeout_ms } => json!({
                "reason": format!("execution timeout of {}ms exceeded", timeout_ms),
            }),
        };
        HistoryEvent::unsequenced(event_type, data, timestamp)
    }
}

/// Single writer of one execution's history
pub struct EventBridge {
    mode: ExecutionMode,
    store: Option<Arc<dyn HistoryStore>>,
    history: History,
    // Sequenced events received ahead of a gap, keyed by sequence number
    reorder: BTreeMap<i32, HistoryEvent>,
    clock: Arc<dyn Clock>,
}

impl EventBridge {
    /// Bridge recording into `store`, starting from its current `history`
    pub fn live(store: Arc<dyn HistoryStore>, history: History, clock: Arc<dyn Clock>) -> Self {
        Self {
            mode: ExecutionMode::Live,
            store: Some(store),
            history,
            reorder: BTreeMap::new(),
            clock,
        }
    }

    /// Bridge over a captured history, with no store behind it
    pub fn replay(history: History, clock: Arc<dyn Clock>) -> Self {
        Self {
            mode: ExecutionMode::Replay,
            store: None,
            history,
            reorder: BTreeMap::new(),
            clock,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// History as recorded so far
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Check if the history is closed
    pub fn is_closed(&self) -> bool {
        self.history.is_terminal()
    }

    /// Number of sequenced events waiting for an earlier one
    pub fn buffered(&self) -> usize {
        self.reorder.len()
    }

    /// Append at the position after the last event this bridge has seen.
    ///
    /// The store rejects the append with `SequenceConflict` when another
    /// writer got there first.
    async fn append(&mut self, event: HistoryEvent) -> Result<HistoryEvent> {
        let event = event.with_sequence_number(self.history.last_sequence() + 1);
        let event = match &self.store {
            Some(store) => store.append(self.history.execution_id(), event).await?,
            None => event,
        };
        self.history.push(event.clone())?;
        Ok(event)
    }

    /// Record the event-producing commands of a drive.
    ///
    /// In live mode, scheduled activities and started timers are returned
    /// for dispatch. Replay mode records nothing.
    pub async fn apply_commands(&mut self, commands: &[WorkflowCommand]) -> Result<Vec<Dispatch>> {
        let mut dispatches = Vec::new();
        if self.mode == ExecutionMode::Replay {
            return Ok(dispatches);
        }

        for command in commands {
            let Some(event_type) = command.event_type() else {
                continue;
            };
            if let Some(terminal) = self.history.terminal_event() {
                warn!(
                    workflow_id = %self.history.execution_id(),
                    command = command.type_name(),
                    closed_by = %terminal.event_type(),
                    "Dropping command for closed history"
                );
                break;
            }

            let now = self.clock.now();
            let mut data = command.event_data();
            let mut fire_at = None;
            if let WorkflowCommand::StartTimer { duration_ms, .. } = command {
                let at = now + ChronoDuration::milliseconds(*duration_ms);
                data["fireAt"] = json!(at);
                fire_at = Some(at);
            }

            let event = self
                .append(HistoryEvent::unsequenced(event_type, data, now))
                .await?;
            debug!(
                workflow_id = %self.history.execution_id(),
                sequence = event.sequence_number(),
                event_type = %event_type,
                "Recorded command"
            );

            match command {
                WorkflowCommand::ScheduleActivity {
                    correlation_token,
                    activity_type,
                    input,
                    options,
                } => dispatches.push(Dispatch::Activity(ActivityDispatch {
                    correlation_token: *correlation_token,
                    activity_type: activity_type.clone(),
                    input: input.clone(),
                    options: options.clone(),
                    attempt: 1,
                    scheduled_at: event.timestamp(),
                })),
                WorkflowCommand::StartTimer { timer_id, .. } => {
                    dispatches.push(Dispatch::Timer(TimerDispatch {
                        timer_id: timer_id.clone(),
                        fire_at: fire_at.unwrap_or(now),
                    }))
                }
                _ => {}
            }
        }
        Ok(dispatches)
    }

    /// Record an inbound event. Returns `None` when the history is already
    /// closed and the event was dropped.
    pub async fn deliver(&mut self, inbound: InboundEvent) -> Result<Option<HistoryEvent>> {
        if let Some(terminal) = self.history.terminal_event() {
            warn!(
                workflow_id = %self.history.execution_id(),
                event_type = %inbound.event_type(),
                closed_by = %terminal.event_type(),
                "Dropping event for closed history"
            );
            return Ok(None);
        }
        let event = inbound.into_event(self.clock.now());
        self.append(event).await.map(Some)
    }

    /// Accept an event that already carries its sequence number.
    ///
    /// Events may arrive out of order; they are held until every earlier
    /// event has been applied. Returns the events applied by this call, in
    /// sequence order. Duplicates of applied events are ignored.
    pub fn ingest(&mut self, event: HistoryEvent) -> Result<Vec<HistoryEvent>> {
        let sequence = event.sequence_number();
        if sequence <= self.history.last_sequence() {
            debug!(sequence, "Ignoring already applied event");
            return Ok(Vec::new());
        }
        self.reorder.entry(sequence).or_insert(event);

        let mut applied = Vec::new();
        while let Some(next) = self.reorder.remove(&(self.history.last_sequence() + 1)) {
            self.history.push(next.clone())?;
            applied.push(next);
        }
        Ok(applied)
    }

    /// Activities scheduled in history without a terminal event.
    ///
    /// The attempt continues the count recorded by `ACTIVITY_ATTEMPT_FAILED`
    /// events.
    pub fn outstanding_activities(&self) -> Vec<ActivityDispatch> {
        let events = self.history.events();
        events
            .iter()
            .filter(|e| e.event_type() == EventType::ActivityScheduled)
            .filter_map(|scheduled| {
                let token = scheduled.correlation_token()?;
                if EventLookup::find_terminal_activity_event(events, token).is_some() {
                    return None;
                }
                let failed_attempts = events
                    .iter()
                    .filter(|e| {
                        e.event_type() == EventType::ActivityAttemptFailed
                            && e.correlation_token() == Some(token)
                    })
                    .count() as u32;
                let options = scheduled
                    .get("options")
                    .cloned()
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_default();
                Some(ActivityDispatch {
                    correlation_token: token,
                    activity_type: scheduled.get_string("activityType")?.to_string(),
                    input: scheduled.get("input").cloned().unwrap_or(Value::Null),
                    options,
                    attempt: failed_attempts + 1,
                    scheduled_at: scheduled.timestamp(),
                })
            })
            .collect()
    }

    /// Timers started in history that have not fired
    pub fn outstanding_timers(&self) -> Vec<TimerDispatch> {
        let events = self.history.events();
        events
            .iter()
            .filter(|e| e.event_type() == EventType::TimerStarted)
            .filter_map(|started| {
                let timer_id = started.timer_id()?;
                if EventLookup::find_timer_fired_event(events, timer_id).is_some() {
                    return None;
                }
                let fire_at = started
                    .get("fireAt")
                    .cloned()
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_else(|| {
                        started.timestamp()
                            + ChronoDuration::milliseconds(
                                started.get_i64("durationMs").unwrap_or_default(),
                            )
                    });
                Some(TimerDispatch {
                    timer_id: timer_id.to_string(),
                    fire_at,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("execution_id", self.history.execution_id())
            .field("mode", &self.mode)
            .field("last_sequence", &self.history.last_sequence())
            .field("buffered", &self.reorder.len())
            .finish()
    }
}
