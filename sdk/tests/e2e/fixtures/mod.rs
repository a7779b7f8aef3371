//! Test fixtures for E2E tests
//!
//! Provides reusable workflow and activity definitions for testing.

#![allow(dead_code)]

pub mod activities;
pub mod workflows;

pub use activities::*;
pub use workflows::*;

use durable_sdk::DurableEngineBuilder;

/// Register every fixture workflow.
pub fn register_all(builder: DurableEngineBuilder) -> DurableEngineBuilder {
    builder
        .register_workflow(BackgroundCheckWorkflow)
        .register_workflow(DelayedBackgroundCheckWorkflow)
        .register_workflow(FlakyWorkflow)
        .register_workflow(TripBookingWorkflow)
        .register_workflow(WorkQueueWorkflow)
        .register_workflow(BatchWorkflow)
        .register_workflow(ApprovalWorkflow)
        .register_workflow(TwoStepWorkflow)
        .register_workflow(SlowWorkflow)
}
