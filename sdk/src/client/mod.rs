//! Client surface for starting, signalling and querying executions

pub mod builder;
pub mod engine;
pub mod hook;

pub use builder::DurableEngineBuilder;
pub use engine::{DurableEngine, StartWorkflowOptions};
pub use hook::{CompositeWorkflowHook, LoggingHook, NoOpHook, WorkflowHook};
