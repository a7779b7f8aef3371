//! Clock and durable timer service

use crate::worker::workflow_worker::ExecutionMessage;
use crate::workflow::bridge::{InboundEvent, TimerDispatch};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

/// Source of event timestamps and timer deadlines
pub trait Clock: Send + Sync {
    /// Current wall-clock time, recorded on appended events
    fn now(&self) -> DateTime<Utc>;

    /// Runtime instant corresponding to a recorded timestamp
    fn instant_for(&self, at: DateTime<Utc>) -> Instant;
}

/// Clock anchored to the tokio runtime clock.
///
/// Timestamps advance with `tokio::time`, so paused-time tests observe
/// event timestamps consistent with their virtual time.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    anchor_utc: DateTime<Utc>,
    anchor_instant: Instant,
}

impl RuntimeClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Clock whose current time is `start`
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            anchor_utc: start,
            anchor_instant: Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor_instant.elapsed()).unwrap_or_default();
        self.anchor_utc + elapsed
    }

    fn instant_for(&self, at: DateTime<Utc>) -> Instant {
        match (at - self.anchor_utc).to_std() {
            Ok(ahead) => self.anchor_instant + ahead,
            // Timestamps before the anchor are already due
            Err(_) => {
                let behind = (self.anchor_utc - at).to_std().unwrap_or_default();
                self.anchor_instant
                    .checked_sub(behind)
                    .unwrap_or(self.anchor_instant)
            }
        }
    }
}

/// Durable timers of one execution.
///
/// Each timer is a task sleeping until its recorded fire time, then sending
/// `TimerFired` to the execution's mailbox. Timers are aborted when the
/// service is dropped.
pub struct TimerService {
    clock: Arc<dyn Clock>,
    pending: Mutex<HashMap<String, AbortHandle>>,
}

impl TimerService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Start a timer unless one with the same id is already pending
    pub fn schedule(&self, timer: TimerDispatch, reply: mpsc::Sender<ExecutionMessage>) {
        let mut pending = self.pending.lock();
        if pending.contains_key(&timer.timer_id) {
            return;
        }

        let deadline = self.clock.instant_for(timer.fire_at);
        let timer_id = timer.timer_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            debug!(timer_id = %timer.timer_id, "Timer fired");
            let fired = InboundEvent::TimerFired {
                timer_id: timer.timer_id,
            };
            let _ = reply.send(fired.into()).await;
        });
        pending.insert(timer_id, handle.abort_handle());
    }

    /// Forget a timer whose `TimerFired` has been recorded
    pub fn fired(&self, timer_id: &str) {
        self.pending.lock().remove(timer_id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Abort every pending timer
    pub fn cancel_all(&self) {
        for (_, handle) in self.pending.lock().drain() {
            handle.abort();
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl std::fmt::Debug for TimerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerService")
            .field("pending", &self.pending_count())
            .finish()
    }
}
