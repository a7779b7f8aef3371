//! Workflow module - events, histories, commands and replay validation

pub mod command;
pub mod event;
pub mod execution;
pub mod history;
pub mod recorder;
pub mod validator;

pub use command::{Awaiting, WorkflowCommand};
pub use event::{EventType, HistoryEvent};
pub use execution::{DeterministicRandom, EventLookup, SeededRandom, WorkflowMetadata};
pub use history::{ExecutionId, ExecutionInfo, ExecutionStatus, History};
pub use recorder::{CommandCollector, CommandRecorder, ValidatingCommandRecorder};
pub use validator::DeterminismValidator;
