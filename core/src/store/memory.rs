//! In-memory history store

use super::HistoryStore;
use crate::error::{CoreError, CoreResult};
use crate::workflow::event::HistoryEvent;
use crate::workflow::history::{ExecutionId, ExecutionInfo, ExecutionStatus, History};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug)]
struct StoredExecution {
    info: ExecutionInfo,
    events: Vec<HistoryEvent>,
}

/// History store keeping every execution in process memory.
///
/// Histories survive engine restarts as long as the store instance is
/// shared, which is how recovery is exercised in tests.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    executions: RwLock<BTreeMap<ExecutionId, StoredExecution>>,
}

impl InMemoryHistoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions held
    pub fn len(&self) -> usize {
        self.executions.read().len()
    }

    /// Check if the store holds no executions
    pub fn is_empty(&self) -> bool {
        self.executions.read().is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn create(&self, info: ExecutionInfo) -> CoreResult<()> {
        let mut executions = self.executions.write();
        if executions.contains_key(&info.execution_id) {
            return Err(CoreError::ExecutionAlreadyExists(
                info.execution_id.to_string(),
            ));
        }
        debug!(
            execution_id = %info.execution_id,
            workflow_type = %info.workflow_type,
            "Created execution"
        );
        executions.insert(
            info.execution_id.clone(),
            StoredExecution {
                info,
                events: Vec::new(),
            },
        );
        Ok(())
    }

    async fn append(&self, id: &ExecutionId, event: HistoryEvent) -> CoreResult<HistoryEvent> {
        let mut executions = self.executions.write();
        let stored = executions
            .get_mut(id)
            .ok_or_else(|| CoreError::ExecutionNotFound(id.to_string()))?;

        if let Some(terminal) = stored
            .events
            .last()
            .filter(|e| e.event_type().is_workflow_terminal())
        {
            return Err(CoreError::HistoryClosed {
                execution_id: id.to_string(),
                closed_by: terminal.event_type(),
            });
        }

        let expected = stored.events.len() as i32 + 1;
        let event = match event.sequence_number() {
            0 => event.with_sequence_number(expected),
            actual if actual == expected => event,
            actual => {
                return Err(CoreError::SequenceConflict {
                    execution_id: id.to_string(),
                    expected,
                    actual,
                })
            }
        };

        if let Some(status) = ExecutionStatus::from_terminal_event(event.event_type()) {
            stored.info.status = status;
            stored.info.close_time = Some(event.timestamp());
        }

        debug!(
            execution_id = %id,
            sequence = event.sequence_number(),
            event_type = %event.event_type(),
            "Appended event"
        );
        stored.events.push(event.clone());
        Ok(event)
    }

    async fn read(&self, id: &ExecutionId) -> CoreResult<History> {
        let executions = self.executions.read();
        let stored = executions
            .get(id)
            .ok_or_else(|| CoreError::ExecutionNotFound(id.to_string()))?;
        History::new(stored.info.clone(), stored.events.clone())
    }

    async fn read_from(
        &self,
        id: &ExecutionId,
        from_sequence: i32,
    ) -> CoreResult<Vec<HistoryEvent>> {
        let executions = self.executions.read();
        let stored = executions
            .get(id)
            .ok_or_else(|| CoreError::ExecutionNotFound(id.to_string()))?;
        Ok(stored
            .events
            .iter()
            .filter(|e| e.sequence_number() >= from_sequence)
            .cloned()
            .collect())
    }

    async fn describe(&self, id: &ExecutionId) -> CoreResult<ExecutionInfo> {
        self.executions
            .read()
            .get(id)
            .map(|stored| stored.info.clone())
            .ok_or_else(|| CoreError::ExecutionNotFound(id.to_string()))
    }

    async fn list(&self, status: Option<ExecutionStatus>) -> CoreResult<Vec<ExecutionInfo>> {
        Ok(self
            .executions
            .read()
            .values()
            .filter(|stored| status.is_none_or(|s| stored.info.status == s))
            .map(|stored| stored.info.clone())
            .collect())
    }
}
