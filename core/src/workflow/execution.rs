//! Workflow execution utilities shared by the live scheduler and the replayer

use crate::workflow::event::{EventType, HistoryEvent};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Workflow metadata extracted from a workflow definition.
///
/// Static description of a workflow type, independent of any execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    /// Unique workflow type identifier (e.g., "background-check")
    pub kind: String,
    /// Human-readable name for display purposes
    pub name: String,
    /// Optional description of what the workflow does
    pub description: Option<String>,
    /// Version of the workflow implementation (e.g., "1.2.0")
    pub version: Option<String>,
    /// Tags for categorization and filtering
    pub tags: Vec<String>,
    /// Whether the workflow observes cancellation requests
    pub cancellable: bool,
    /// Execution timeout in seconds (None means the engine default)
    pub timeout_seconds: Option<u64>,
}

impl WorkflowMetadata {
    /// Create a new WorkflowMetadata with required fields only
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            kind: kind.clone(),
            name: kind,
            description: None,
            version: None,
            tags: Vec::new(),
            cancellable: true,
            timeout_seconds: None,
        }
    }

    /// Set the human-readable name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set whether the workflow is cancellable
    pub fn with_cancellable(mut self, cancellable: bool) -> Self {
        self.cancellable = cancellable;
        self
    }

    /// Set the timeout in seconds
    pub fn with_timeout_seconds(mut self, timeout: u64) -> Self {
        self.timeout_seconds = Some(timeout);
        self
    }
}

/// Trait for deterministic random number generation.
///
/// Workflows must use deterministic random to stay replayable. Every value is
/// derived from a seed taken from the execution's run id.
pub trait DeterministicRandom: Send + Sync {
    /// Generate a random integer in the range [min, max)
    fn next_int(&self, min: i32, max: i32) -> i32;

    /// Generate a random long in the range [min, max)
    fn next_long(&self, min: i64, max: i64) -> i64;

    /// Generate a random double in the range [0, 1)
    fn next_double(&self) -> f64;

    /// Generate a random boolean
    fn next_bool(&self) -> bool;
}

/// Seeded deterministic random number generator using xorshift64.
pub struct SeededRandom {
    state: RwLock<u64>,
}

impl SeededRandom {
    /// Create a new seeded random with the given seed
    pub fn new(seed: u64) -> Self {
        // xorshift never leaves the all-zero state
        let seed = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self {
            state: RwLock::new(seed),
        }
    }

    /// Derive a seed from the bytes of a run id
    pub fn seed_from_bytes(bytes: &[u8]) -> u64 {
        bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, b| {
            (hash ^ *b as u64).wrapping_mul(0x0100_0000_01b3)
        })
    }

    fn next_u64(&self) -> u64 {
        let mut state = self.state.write();
        let mut x = *state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        *state = x;
        x
    }
}

impl DeterministicRandom for SeededRandom {
    fn next_int(&self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        let range = (max as i64 - min as i64) as u64;
        let random = self.next_u64();
        (min as i64 + (random % range) as i64) as i32
    }

    fn next_long(&self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        let range = max.wrapping_sub(min) as u64;
        let random = self.next_u64();
        min.wrapping_add((random % range) as i64)
    }

    fn next_double(&self) -> f64 {
        // 53 significant bits keep the result strictly below 1.0
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn next_bool(&self) -> bool {
        self.next_u64() & 1 == 0
    }
}

/// Utilities for finding events in an execution's history.
///
/// Where several events could resolve the same call, the one with the lowest
/// sequence number wins. Later duplicates stay in history but are ignored.
pub struct EventLookup;

impl EventLookup {
    /// Find the event resolving the activity with this correlation token
    pub fn find_terminal_activity_event(
        events: &[HistoryEvent],
        correlation_token: u32,
    ) -> Option<&HistoryEvent> {
        events
            .iter()
            .filter(|e| {
                e.event_type().is_activity_terminal()
                    && e.correlation_token() == Some(correlation_token)
            })
            .min_by_key(|e| e.sequence_number())
    }

    /// Find the event firing the timer with this id
    pub fn find_timer_fired_event<'a>(
        events: &'a [HistoryEvent],
        timer_id: &str,
    ) -> Option<&'a HistoryEvent> {
        events
            .iter()
            .filter(|e| e.event_type() == EventType::TimerFired && e.timer_id() == Some(timer_id))
            .min_by_key(|e| e.sequence_number())
    }

    /// Find the first cancellation request
    pub fn find_cancellation_request(events: &[HistoryEvent]) -> Option<&HistoryEvent> {
        events
            .iter()
            .find(|e| e.event_type() == EventType::CancellationRequested)
    }

    /// Signals in arrival order, optionally restricted to one name
    pub fn signal_events<'a>(
        events: &'a [HistoryEvent],
        name: Option<&str>,
    ) -> Vec<&'a HistoryEvent> {
        events
            .iter()
            .filter(|e| e.event_type() == EventType::SignalReceived)
            .filter(|e| match name {
                Some(name) => e.get_string("signalName") == Some(name),
                None => true,
            })
            .collect()
    }

    /// Events produced by workflow commands, in the order they were recorded
    pub fn command_events(events: &[HistoryEvent]) -> Vec<HistoryEvent> {
        events
            .iter()
            .filter(|e| e.event_type().is_command_event())
            .cloned()
            .collect()
    }

    /// Filter events by type
    pub fn filter_events_by_type(
        events: &[HistoryEvent],
        event_type: EventType,
    ) -> Vec<HistoryEvent> {
        events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }
}
