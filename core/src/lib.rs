//! # Durable Core
//!
//! Runtime-agnostic building blocks of the durable workflow engine.
//!
//! This crate owns the data model every other part of the engine agrees on:
//! the event history of an execution, the commands workflow code emits, and
//! the rules that decide whether a re-run of workflow code is faithful to
//! what it did before.
//!
//! ## What's in Core vs SDK
//!
//! **Core** contains the runtime-agnostic pieces:
//! - History events, histories and their JSON exchange format
//! - Workflow commands and what a suspended workflow is awaiting
//! - Determinism validation and command recording
//! - Activity options, retry policy and backoff
//! - The history store abstraction and an in-memory store
//!
//! **SDK** contains the async runtime pieces:
//! - Workflow and activity traits, contexts and registries
//! - The scheduler, event bridge and activity gateway
//! - The engine client, offline replayer and hooks
//! - Testing utilities
//!
//! ## Modules
//!
//! - [`workflow`] - Events, histories, commands, recording and validation
//! - [`activity`] - Activity options, retry policy and execution results
//! - [`store`] - History storage
//! - [`error`] - Core error types

pub mod activity;
pub mod error;
pub mod store;
pub mod workflow;

// Re-export error types
pub use error::{CoreError, CoreResult, DeterminismViolationError};

// Re-export activity types
pub use activity::{
    calculate_backoff, duration_millis, should_retry, ActivityExecutionResult, ActivityFailureCause,
    ActivityOptions, RetryPolicy,
};

// Re-export store types
pub use store::{HistoryStore, InMemoryHistoryStore};

// Re-export workflow types
pub use workflow::{
    Awaiting, CommandCollector, CommandRecorder, DeterminismValidator, DeterministicRandom,
    EventLookup, EventType, ExecutionId, ExecutionInfo, ExecutionStatus, History, HistoryEvent,
    SeededRandom, ValidatingCommandRecorder, WorkflowCommand, WorkflowMetadata,
};
