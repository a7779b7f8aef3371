//! Activity invocation gateway
//!
//! Hands scheduled activities to an [`ActivityExecutor`], enforces timeouts
//! and retry policy, and reports each outcome back to the owning execution
//! as an [`InboundEvent`].

use crate::activity::context::ActivityContext;
use crate::activity::definition::ActivityError;
use crate::activity::registry::ActivityRegistry;
use crate::worker::timer::Clock;
use crate::worker::workflow_worker::ExecutionMessage;
use crate::workflow::bridge::{ActivityDispatch, InboundEvent};
use async_trait::async_trait;
use durable_core::{calculate_backoff, duration_millis, should_retry, ExecutionId, RetryPolicy};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Runs one attempt of an activity.
///
/// The registry-backed [`RegistryActivityExecutor`] is the default; tests
/// substitute scripted implementations.
#[async_trait]
pub trait ActivityExecutor: Send + Sync {
    async fn invoke(
        &self,
        activity_type: &str,
        input: Value,
        ctx: ActivityContext,
    ) -> Result<Value, ActivityError>;
}

/// Executor dispatching to handlers registered in an [`ActivityRegistry`]
#[derive(Debug, Clone)]
pub struct RegistryActivityExecutor {
    registry: Arc<ActivityRegistry>,
}

impl RegistryActivityExecutor {
    pub fn new(registry: Arc<ActivityRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ActivityExecutor for RegistryActivityExecutor {
    async fn invoke(
        &self,
        activity_type: &str,
        input: Value,
        ctx: ActivityContext,
    ) -> Result<Value, ActivityError> {
        let Some(activity) = self.registry.get(activity_type) else {
            return Err(ActivityError::non_retryable(format!(
                "Activity '{}' is not registered",
                activity_type
            ))
            .with_error_type("ACTIVITY_NOT_REGISTERED"));
        };
        activity.execute(ctx, input).await
    }
}

type InFlight = Arc<Mutex<HashMap<(ExecutionId, u32), AbortHandle>>>;

/// Dispatches activity calls to the executor with bounded concurrency.
///
/// Attempts across all executions share one semaphore of
/// `max_concurrent_activities` permits. Every call runs in its own task,
/// tracked by execution and correlation token so cancellation can abort it.
pub struct ActivityGateway {
    executor: Arc<dyn ActivityExecutor>,
    permits: Arc<Semaphore>,
    in_flight: InFlight,
    clock: Arc<dyn Clock>,
}

impl ActivityGateway {
    pub fn new(
        executor: Arc<dyn ActivityExecutor>,
        max_concurrent_activities: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            executor,
            permits: Arc::new(Semaphore::new(max_concurrent_activities)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Number of calls currently tracked as in flight
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Start a call. Its outcome is sent to `reply` once retries are
    /// exhausted or an attempt succeeds; each retried failure is reported
    /// as an `ActivityAttemptFailed` first.
    pub fn dispatch(
        &self,
        execution_id: ExecutionId,
        dispatch: ActivityDispatch,
        reply: mpsc::Sender<ExecutionMessage>,
    ) {
        let key = (execution_id.clone(), dispatch.correlation_token);
        debug!(
            workflow_id = %execution_id,
            activity_type = %dispatch.activity_type,
            correlation_token = dispatch.correlation_token,
            attempt = dispatch.attempt,
            "Dispatching activity"
        );

        let call = ActivityCall {
            executor: Arc::clone(&self.executor),
            permits: Arc::clone(&self.permits),
            in_flight: Arc::clone(&self.in_flight),
            clock: Arc::clone(&self.clock),
            execution_id,
            dispatch,
            reply,
        };

        // Hold the lock across spawn so the call cannot deregister before it is tracked
        let mut in_flight = self.in_flight.lock();
        let handle = tokio::spawn(call.run());
        in_flight.insert(key, handle.abort_handle());
    }

    /// Abort every in-flight call of an execution, returning the
    /// correlation tokens that were aborted.
    pub fn abort_execution(&self, execution_id: &ExecutionId) -> Vec<u32> {
        let mut in_flight = self.in_flight.lock();
        let keys: Vec<_> = in_flight
            .keys()
            .filter(|(id, _)| id == execution_id)
            .cloned()
            .collect();

        let mut aborted = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(handle) = in_flight.remove(&key) {
                handle.abort();
                aborted.push(key.1);
            }
        }
        aborted.sort_unstable();
        aborted
    }
}

impl std::fmt::Debug for ActivityGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityGateway")
            .field("available_permits", &self.permits.available_permits())
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

struct ActivityCall {
    executor: Arc<dyn ActivityExecutor>,
    permits: Arc<Semaphore>,
    in_flight: InFlight,
    clock: Arc<dyn Clock>,
    execution_id: ExecutionId,
    dispatch: ActivityDispatch,
    reply: mpsc::Sender<ExecutionMessage>,
}

impl ActivityCall {
    async fn run(self) {
        let options = &self.dispatch.options;
        // Without a policy a call gets exactly one attempt
        let policy = options
            .retry_policy
            .clone()
            .unwrap_or_else(|| RetryPolicy::default().with_maximum_attempts(1));
        let deadline = options
            .schedule_to_close_timeout()
            .map(|timeout| self.clock.instant_for(self.dispatch.scheduled_at) + timeout);

        let mut attempt = self.dispatch.attempt.max(1);
        let outcome = loop {
            let err = match self.run_attempt(attempt, deadline).await {
                Ok(result) => {
                    break InboundEvent::ActivityCompleted {
                        correlation_token: self.dispatch.correlation_token,
                        activity_type: self.dispatch.activity_type.clone(),
                        result,
                        attempt,
                    };
                }
                Err(err) => err,
            };

            let retryable = err.is_retryable() && !policy.is_non_retryable(err.error_type());
            let backoff = calculate_backoff(&policy, attempt);
            let within_deadline = deadline.is_none_or(|d| Instant::now() + backoff < d);

            if should_retry(&policy, attempt, retryable) && within_deadline {
                warn!(
                    workflow_id = %self.execution_id,
                    activity_type = %self.dispatch.activity_type,
                    attempt,
                    retry_in_ms = duration_millis(backoff),
                    error = %err,
                    "Activity attempt failed, retrying"
                );
                let attempt_failed = InboundEvent::ActivityAttemptFailed {
                    correlation_token: self.dispatch.correlation_token,
                    activity_type: self.dispatch.activity_type.clone(),
                    error: err.to_string(),
                    error_type: err.error_type().map(str::to_string),
                    cause: err.cause(),
                    attempt,
                };
                if self.reply.send(attempt_failed.into()).await.is_err() {
                    return;
                }
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            break InboundEvent::ActivityFailed {
                correlation_token: self.dispatch.correlation_token,
                activity_type: self.dispatch.activity_type.clone(),
                error: err.to_string(),
                error_type: err.error_type().map(str::to_string),
                cause: err.cause(),
                attempt,
            };
        };

        self.in_flight
            .lock()
            .remove(&(self.execution_id.clone(), self.dispatch.correlation_token));

        if self.reply.send(outcome.into()).await.is_err() {
            debug!(
                workflow_id = %self.execution_id,
                correlation_token = self.dispatch.correlation_token,
                "Execution stopped before activity outcome was delivered"
            );
        }
    }

    async fn run_attempt(
        &self,
        attempt: u32,
        deadline: Option<Instant>,
    ) -> Result<Value, ActivityError> {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ActivityError::Cancelled)?;

        let ctx = ActivityContext::new(
            self.execution_id.clone(),
            self.dispatch.activity_type.clone(),
            self.dispatch.correlation_token,
            attempt,
            self.dispatch.scheduled_at,
        );

        let per_attempt = self.dispatch.options.start_to_close_timeout();
        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        let limit = match (per_attempt, remaining) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let call = self.executor.invoke(
            &self.dispatch.activity_type,
            self.dispatch.input.clone(),
            ctx,
        );
        match limit {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(ActivityError::Timeout)),
            None => call.await,
        }
    }
}
