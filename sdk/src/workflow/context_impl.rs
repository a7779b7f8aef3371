//! WorkflowContextImpl - Concrete implementation of WorkflowContext

use crate::error::{DeterminismViolationError, DurableError, Result};
use crate::workflow::context::{ReceivedSignal, WorkflowContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use durable_core::{
    ActivityFailureCause, ActivityOptions, Awaiting, CommandRecorder, DeterminismValidator,
    DeterministicRandom, EventLookup, EventType, ExecutionId, History, HistoryEvent,
    SeededRandom, WorkflowCommand,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Concrete implementation of WorkflowContext.
///
/// A context lives for one drive: the workflow function runs from the start
/// against the full history, and every blocking call either finds its
/// result in history or suspends the drive.
///
/// Once a drive has suspended or hit a determinism fault, every later
/// blocking call reports the same outcome again. Workflow code that catches
/// an error and carries on cannot record commands past that point.
pub struct WorkflowContextImpl<R: CommandRecorder> {
    execution_id: ExecutionId,
    workflow_type: String,
    input: Value,

    /// Command recorder for determinism validation
    recorder: Mutex<R>,

    /// Full history this drive runs against
    events: Vec<HistoryEvent>,

    /// Command-producing events of the history, in order
    command_events: Vec<HistoryEvent>,

    /// Timestamp of the most recently consumed event
    current_time: RwLock<DateTime<Utc>>,

    uuid_counter: AtomicI64,
    random: SeededRandom,

    /// Correlation token of the next scheduled activity
    next_activity_token: AtomicU32,
    /// Number of timers started so far
    timer_count: AtomicU32,

    /// Sequence numbers of signals already handed to workflow code
    consumed_signals: Mutex<HashSet<i32>>,

    query_state: RwLock<BTreeMap<String, Value>>,

    cancellation: Option<HistoryEvent>,
    cancellation_delivered: AtomicBool,

    /// Commands beyond the recorded frontier
    new_commands: Mutex<Vec<WorkflowCommand>>,
    awaiting: Mutex<Option<Awaiting>>,
    fault: Mutex<Option<DeterminismViolationError>>,
}

impl<R: CommandRecorder> WorkflowContextImpl<R> {
    /// Create a context for one drive over `history`
    pub fn new(history: &History, recorder: R) -> Self {
        let events = history.events().to_vec();
        let execution = history.execution();
        let start_time = events
            .iter()
            .find(|e| e.event_type() == EventType::WorkflowStarted)
            .map(|e| e.timestamp())
            .unwrap_or(execution.start_time);
        let run_id = execution.execution_id.run_id;

        Self {
            execution_id: execution.execution_id.clone(),
            workflow_type: execution.workflow_type.clone(),
            input: execution.input.clone(),
            recorder: Mutex::new(recorder),
            command_events: EventLookup::command_events(&events),
            cancellation: EventLookup::find_cancellation_request(&events).cloned(),
            events,
            current_time: RwLock::new(start_time),
            uuid_counter: AtomicI64::new(0),
            random: SeededRandom::new(SeededRandom::seed_from_bytes(run_id.as_bytes())),
            next_activity_token: AtomicU32::new(0),
            timer_count: AtomicU32::new(0),
            consumed_signals: Mutex::new(HashSet::new()),
            query_state: RwLock::new(BTreeMap::new()),
            cancellation_delivered: AtomicBool::new(false),
            new_commands: Mutex::new(Vec::new()),
            awaiting: Mutex::new(None),
            fault: Mutex::new(None),
        }
    }

    /// Record a command via the recorder.
    ///
    /// Returns whether the command was matched against a recorded event.
    /// Commands past the recorded frontier are also kept as new commands.
    pub(crate) fn record_command(&self, command: WorkflowCommand) -> Result<bool> {
        let mut recorder = self.recorder.lock();
        let replayed = command.event_type().is_some()
            && self.command_events.get(recorder.command_count()).is_some();

        if let Err(violation) = recorder.record_command(command.clone()) {
            self.fault.lock().get_or_insert(violation.clone());
            return Err(DurableError::NonDeterminism(violation));
        }
        if !replayed && command.event_type().is_some() {
            self.new_commands.lock().push(command);
        }
        Ok(replayed)
    }

    fn next_command_recorded(&self) -> bool {
        let position = self.recorder.lock().command_count();
        position < self.command_events.len()
    }

    /// Fail fast once the drive has suspended or diverged
    fn ensure_running(&self) -> Result<()> {
        if let Some(violation) = self.fault.lock().clone() {
            return Err(DurableError::NonDeterminism(violation));
        }
        if let Some(awaiting) = self.awaiting.lock().as_ref() {
            return Err(DurableError::Suspended {
                reason: format!("Waiting for {}", awaiting),
            });
        }
        Ok(())
    }

    fn suspend<T>(&self, awaiting: Awaiting) -> Result<T> {
        let reason = format!("Waiting for {}", awaiting);
        self.record_command(WorkflowCommand::ContinueWaiting {
            awaiting: awaiting.clone(),
        })?;
        self.awaiting.lock().get_or_insert(awaiting);
        Err(DurableError::Suspended { reason })
    }

    /// Deliver cancellation at a blocking call.
    ///
    /// `resolved_by` is the sequence number of the event that would resolve
    /// the call. Cancellation preempts calls that are unresolved or resolved
    /// only after the request, and is delivered once per drive.
    fn take_cancellation(&self, resolved_by: Option<i32>) -> Option<String> {
        let request = self.cancellation.as_ref()?;
        let preempts = resolved_by.is_none_or(|seq| seq > request.sequence_number());
        if preempts && !self.cancellation_delivered.swap(true, Ordering::SeqCst) {
            return Some(cancellation_reason(request));
        }
        None
    }

    fn observe(&self, event: &HistoryEvent) {
        *self.current_time.write() = event.timestamp();
    }

    fn next_unconsumed_signal(&self, name: Option<&str>) -> Option<&HistoryEvent> {
        let consumed = self.consumed_signals.lock();
        EventLookup::signal_events(&self.events, name)
            .into_iter()
            .find(|e| !consumed.contains(&e.sequence_number()))
    }

    fn consume_signal(&self, event: &HistoryEvent) -> ReceivedSignal {
        self.consumed_signals.lock().insert(event.sequence_number());
        self.observe(event);
        ReceivedSignal {
            name: event.get_string("signalName").unwrap_or_default().to_string(),
            payload: event.get("payload").cloned().unwrap_or(Value::Null),
        }
    }

    /// Get all commands recorded so far
    pub fn get_commands(&self) -> Vec<WorkflowCommand> {
        self.recorder.lock().get_commands()
    }

    /// Take the commands issued past the recorded frontier
    pub fn take_new_commands(&self) -> Vec<WorkflowCommand> {
        std::mem::take(&mut *self.new_commands.lock())
    }

    /// What the drive suspended on, if it suspended
    pub fn awaiting(&self) -> Option<Awaiting> {
        self.awaiting.lock().clone()
    }

    /// First determinism fault of the drive, if any
    pub fn fault(&self) -> Option<DeterminismViolationError> {
        self.fault.lock().clone()
    }

    /// Snapshot of the published query values
    pub fn query_state(&self) -> BTreeMap<String, Value> {
        self.query_state.read().clone()
    }

    /// Check that the drive reached every recorded command event
    pub fn validate_all_consumed(&self) -> std::result::Result<(), DeterminismViolationError> {
        let recorder = self.recorder.lock();
        DeterminismValidator::new().validate_all_consumed(recorder.unmatched_events())
    }
}

fn cancellation_reason(request: &HistoryEvent) -> String {
    request
        .get_string("reason")
        .unwrap_or("Cancellation requested")
        .to_string()
}

#[async_trait]
impl<R: CommandRecorder> WorkflowContext for WorkflowContextImpl<R> {
    fn workflow_id(&self) -> &str {
        &self.execution_id.workflow_id
    }

    fn run_id(&self) -> Uuid {
        self.execution_id.run_id
    }

    fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    fn workflow_type(&self) -> &str {
        &self.workflow_type
    }

    fn input_raw(&self) -> &Value {
        &self.input
    }

    fn current_time(&self) -> DateTime<Utc> {
        *self.current_time.read()
    }

    fn random_uuid(&self) -> Uuid {
        let counter = self.uuid_counter.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}:{}", self.execution_id, counter);
        Uuid::new_v5(&self.execution_id.run_id, name.as_bytes())
    }

    fn random(&self) -> &dyn DeterministicRandom {
        &self.random
    }

    fn is_replaying(&self) -> bool {
        self.next_command_recorded()
    }

    async fn execute_activity_raw(
        &self,
        activity_type: &str,
        input: Value,
        options: ActivityOptions,
    ) -> Result<Value> {
        self.ensure_running()?;
        options.validate(activity_type)?;

        if !self.next_command_recorded() {
            if let Some(reason) = self.take_cancellation(None) {
                return Err(DurableError::Cancelled(reason));
            }
        }

        let correlation_token = self.next_activity_token.load(Ordering::SeqCst);
        self.record_command(WorkflowCommand::ScheduleActivity {
            correlation_token,
            activity_type: activity_type.to_string(),
            input,
            options,
        })?;
        self.next_activity_token.fetch_add(1, Ordering::SeqCst);

        let resolved = EventLookup::find_terminal_activity_event(&self.events, correlation_token);
        if let Some(reason) = self.take_cancellation(resolved.map(|e| e.sequence_number())) {
            return Err(DurableError::Cancelled(reason));
        }

        let Some(event) = resolved else {
            return self.suspend(Awaiting::ActivityCompletion {
                correlation_token,
                activity_type: activity_type.to_string(),
            });
        };

        self.observe(event);
        if event.event_type() == EventType::ActivityCompleted {
            return Ok(event.get("result").cloned().unwrap_or(Value::Null));
        }

        Err(DurableError::ActivityFailed {
            activity_type: activity_type.to_string(),
            message: event.get_string("error").unwrap_or_default().to_string(),
            error_type: event.get_string("errorType").map(str::to_string),
            cause: event
                .get_string("cause")
                .and_then(ActivityFailureCause::parse)
                .unwrap_or(ActivityFailureCause::Application),
        })
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        self.ensure_running()?;

        if !self.next_command_recorded() {
            if let Some(reason) = self.take_cancellation(None) {
                return Err(DurableError::Cancelled(reason));
            }
        }

        // Timer ids come from a per-drive counter so they repeat on every re-run
        let timer_id = format!("timer-{}", self.timer_count.load(Ordering::SeqCst) + 1);
        self.record_command(WorkflowCommand::StartTimer {
            timer_id: timer_id.clone(),
            duration_ms: i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        })?;
        self.timer_count.fetch_add(1, Ordering::SeqCst);

        let fired = EventLookup::find_timer_fired_event(&self.events, &timer_id);
        if let Some(reason) = self.take_cancellation(fired.map(|e| e.sequence_number())) {
            return Err(DurableError::Cancelled(reason));
        }

        match fired {
            Some(event) => {
                self.observe(event);
                Ok(())
            }
            None => self.suspend(Awaiting::TimerFired { timer_id }),
        }
    }

    async fn wait_for_signal_raw(&self, name: &str) -> Result<Value> {
        self.ensure_running()?;

        let signal = self.next_unconsumed_signal(Some(name));
        if let Some(reason) = self.take_cancellation(signal.map(|e| e.sequence_number())) {
            return Err(DurableError::Cancelled(reason));
        }

        match signal {
            Some(event) => Ok(self.consume_signal(event).payload),
            None => self.suspend(Awaiting::Signal {
                name: Some(name.to_string()),
            }),
        }
    }

    async fn next_signal(&self) -> Result<ReceivedSignal> {
        self.ensure_running()?;

        let signal = self.next_unconsumed_signal(None);
        if let Some(reason) = self.take_cancellation(signal.map(|e| e.sequence_number())) {
            return Err(DurableError::Cancelled(reason));
        }

        match signal {
            Some(event) => Ok(self.consume_signal(event)),
            None => self.suspend(Awaiting::Signal { name: None }),
        }
    }

    fn set_query_state_raw(&self, name: &str, value: Value) {
        self.query_state.write().insert(name.to_string(), value);
    }

    fn is_cancellation_requested(&self) -> bool {
        let Some(request) = self.cancellation.as_ref() else {
            return false;
        };
        if self.cancellation_delivered.load(Ordering::SeqCst) {
            return true;
        }
        // Visible once the code has caught up with everything recorded
        // before the request
        let consumed = self.consumed_signals.lock();
        let signals_pending = EventLookup::signal_events(&self.events, None)
            .into_iter()
            .any(|e| {
                e.sequence_number() < request.sequence_number()
                    && !consumed.contains(&e.sequence_number())
            });
        !signals_pending && !self.next_command_recorded()
    }

    fn check_cancellation(&self) -> Result<()> {
        if !self.is_cancellation_requested() {
            return Ok(());
        }
        self.cancellation_delivered.store(true, Ordering::SeqCst);
        let reason = self
            .cancellation
            .as_ref()
            .map(cancellation_reason)
            .unwrap_or_default();
        Err(DurableError::Cancelled(reason))
    }
}
