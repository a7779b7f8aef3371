//! Execution machinery: scheduling, the per-execution task, timers and replay

pub mod registry;
pub mod replayer;
pub mod scheduler;
pub mod timer;
pub mod workflow_worker;

pub use registry::{BoxedWorkflowFn, RegisteredWorkflow, WorkflowRegistry};
pub use replayer::{ReplayResult, WorkflowReplayer};
pub use scheduler::{SchedulerState, WorkflowScheduler, WorkflowTaskResult};
pub use timer::{Clock, RuntimeClock, TimerService};
pub use workflow_worker::{
    ExecutionActor, ExecutionHandle, ExecutionMessage, ExecutionOutcome, ExecutionServices,
    QuerySnapshot,
};
