//! Workflow definitions, the deterministic context and the command/event bridge

pub mod bridge;
pub mod context;
pub mod context_impl;
pub mod definition;

pub use bridge::{ActivityDispatch, Dispatch, EventBridge, ExecutionMode, InboundEvent, TimerDispatch};
pub use context::{ReceivedSignal, WorkflowContext, WorkflowContextExt};
pub use context_impl::WorkflowContextImpl;
pub use definition::{generate_schema, WorkflowDefinition};
