//! Durable workflow SDK for Rust
//!
//! This SDK runs workflow code durably: every decision the code makes and
//! every outcome it observes is recorded in an append-only history, and the
//! code is re-run against that history to rebuild its state after a
//! suspension or a restart. Workflow code must therefore be deterministic;
//! divergence from the recorded history is detected and reported as a
//! non-determinism fault.

#![allow(clippy::result_large_err)]

pub mod activity;
pub mod client;
pub mod config;
pub mod error;
pub mod worker;
pub mod workflow;

/// Testing utilities for workflows and activities.
/// Available only with the `testing` feature enabled.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use error::{classify_error, DeterminismViolationError, DurableError, FailureType, Result};

// Re-export config types
pub use config::{ConfigError, EngineConfig};

// Re-export client types
pub use client::{
    CompositeWorkflowHook, DurableEngine, DurableEngineBuilder, LoggingHook, NoOpHook,
    StartWorkflowOptions, WorkflowHook,
};

// Re-export activity types
pub use activity::{
    ActivityContext, ActivityDefinition, ActivityError, ActivityExecutor, ActivityGateway,
    ActivityMetadata, ActivityRegistry, RegisteredActivity, RegistryActivityExecutor,
};

// Re-export workflow types
pub use workflow::{
    EventBridge, InboundEvent, ReceivedSignal, WorkflowContext, WorkflowContextExt,
    WorkflowContextImpl, WorkflowDefinition,
};

// Re-export worker types
pub use worker::{
    Clock, ExecutionOutcome, RegisteredWorkflow, ReplayResult, RuntimeClock, SchedulerState,
    WorkflowRegistry, WorkflowReplayer, WorkflowScheduler, WorkflowTaskResult,
};

// Re-export core types
pub use durable_core::{
    ActivityFailureCause, ActivityOptions, EventType, ExecutionId, ExecutionInfo, ExecutionStatus,
    History, HistoryEvent, HistoryStore, InMemoryHistoryStore, RetryPolicy, WorkflowCommand,
    WorkflowMetadata,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::activity::{ActivityContext, ActivityDefinition, ActivityError};
    pub use crate::client::{
        DurableEngine, DurableEngineBuilder, LoggingHook, NoOpHook, StartWorkflowOptions,
        WorkflowHook,
    };
    pub use crate::config::EngineConfig;
    pub use crate::error::{DurableError, FailureType, Result};
    pub use crate::worker::{ReplayResult, WorkflowReplayer};
    pub use crate::workflow::{WorkflowContext, WorkflowContextExt, WorkflowDefinition};
    pub use async_trait::async_trait;
    pub use durable_core::{
        ActivityOptions, ExecutionId, ExecutionStatus, History, InMemoryHistoryStore, RetryPolicy,
    };
    pub use schemars::JsonSchema;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{json, Value};
}
