//! Durable history storage
//!
//! The store is the source of truth for every execution. Each execution's
//! history is append-only; appends carry the expected position so a second
//! writer is detected instead of interleaving events.

mod memory;

pub use memory::InMemoryHistoryStore;

use crate::error::CoreResult;
use crate::workflow::event::HistoryEvent;
use crate::workflow::history::{ExecutionId, ExecutionInfo, ExecutionStatus, History};
use async_trait::async_trait;

/// Storage for execution histories
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Register a new execution with an empty history.
    ///
    /// Fails with `ExecutionAlreadyExists` if the execution id is taken.
    async fn create(&self, info: ExecutionInfo) -> CoreResult<()>;

    /// Append an event to an execution's history.
    ///
    /// An event with sequence number 0 is assigned the next position. A
    /// non-zero sequence number must equal the next position, otherwise
    /// `SequenceConflict` is returned. Appending to a closed history fails
    /// with `HistoryClosed`. Returns the event as stored.
    async fn append(&self, id: &ExecutionId, event: HistoryEvent) -> CoreResult<HistoryEvent>;

    /// Read an execution's full history
    async fn read(&self, id: &ExecutionId) -> CoreResult<History>;

    /// Read the events with a sequence number greater than or equal to `from_sequence`
    async fn read_from(&self, id: &ExecutionId, from_sequence: i32)
        -> CoreResult<Vec<HistoryEvent>>;

    /// Describe an execution
    async fn describe(&self, id: &ExecutionId) -> CoreResult<ExecutionInfo>;

    /// List executions, optionally restricted to one status
    async fn list(&self, status: Option<ExecutionStatus>) -> CoreResult<Vec<ExecutionInfo>>;

    /// Executions whose history is still open
    async fn list_running(&self) -> CoreResult<Vec<ExecutionInfo>> {
        self.list(Some(ExecutionStatus::Running)).await
    }
}
