//! Scripted activity executor for testing workflows without real activities.

use crate::activity::context::ActivityContext;
use crate::activity::definition::ActivityError;
use crate::activity::gateway::ActivityExecutor;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Scripted implementation of [`ActivityExecutor`].
///
/// Each activity type answers from a queue of scripted responses, then
/// from its fallback response once the queue is empty. Unscripted activity
/// types fail with a non-retryable error. Every attempt is recorded.
///
/// Clones share their script and call log, so a test can keep one clone
/// for assertions after handing another to the engine.
///
/// # Example
///
/// ```ignore
/// use durable_sdk::testing::MockActivityExecutor;
///
/// let executor = MockActivityExecutor::new()
///     .with_result("ssn-trace", json!("pass"))
///     .with_responses("flaky", vec![Err(ActivityError::application("boom")), Ok(json!(1))]);
///
/// let engine = DurableEngine::builder()
///     .activity_executor(executor.clone())
///     .build()?;
/// // ...
/// assert_eq!(executor.call_count("flaky"), 2);
/// ```
#[derive(Clone, Default)]
pub struct MockActivityExecutor {
    inner: Arc<MockActivityExecutorInner>,
}

#[derive(Default)]
struct MockActivityExecutorInner {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Response>,
    fallback: Option<Response>,
    delay: Option<Duration>,
}

#[derive(Clone)]
enum Response {
    Reply(Result<Value, ActivityError>),
    Hang,
}

/// One attempt the executor received
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub activity_type: String,
    pub input: Value,
    pub correlation_token: u32,
    pub attempt: u32,
}

impl MockActivityExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(self, activity_type: &str, edit: impl FnOnce(&mut Script)) -> Self {
        edit(
            self.inner
                .scripts
                .lock()
                .entry(activity_type.to_string())
                .or_default(),
        );
        self
    }

    /// Answer every call of `activity_type` with `result`.
    pub fn with_result(self, activity_type: &str, result: Value) -> Self {
        self.script(activity_type, |s| s.fallback = Some(Response::Reply(Ok(result))))
    }

    /// Fail every call of `activity_type` with `error`.
    pub fn with_error(self, activity_type: &str, error: ActivityError) -> Self {
        self.script(activity_type, |s| s.fallback = Some(Response::Reply(Err(error))))
    }

    /// Answer the next calls of `activity_type` in order.
    pub fn with_responses(
        self,
        activity_type: &str,
        responses: Vec<Result<Value, ActivityError>>,
    ) -> Self {
        self.script(activity_type, |s| {
            s.queue.extend(responses.into_iter().map(Response::Reply))
        })
    }

    /// Never answer calls of `activity_type`.
    pub fn hanging(self, activity_type: &str) -> Self {
        self.script(activity_type, |s| s.fallback = Some(Response::Hang))
    }

    /// Wait `delay` before answering calls of `activity_type`.
    pub fn with_delay(self, activity_type: &str, delay: Duration) -> Self {
        self.script(activity_type, |s| s.delay = Some(delay))
    }

    /// Every attempt received, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.calls.lock().clone()
    }

    /// Number of attempts received for `activity_type`
    pub fn call_count(&self, activity_type: &str) -> usize {
        self.inner
            .calls
            .lock()
            .iter()
            .filter(|c| c.activity_type == activity_type)
            .count()
    }

    /// Total number of attempts received
    pub fn total_calls(&self) -> usize {
        self.inner.calls.lock().len()
    }

    fn next_response(&self, activity_type: &str) -> (Option<Response>, Option<Duration>) {
        let mut scripts = self.inner.scripts.lock();
        match scripts.get_mut(activity_type) {
            Some(script) => {
                let response = script.queue.pop_front().or_else(|| script.fallback.clone());
                (response, script.delay)
            }
            None => (None, None),
        }
    }
}

#[async_trait]
impl ActivityExecutor for MockActivityExecutor {
    async fn invoke(
        &self,
        activity_type: &str,
        input: Value,
        ctx: ActivityContext,
    ) -> Result<Value, ActivityError> {
        self.inner.calls.lock().push(RecordedCall {
            activity_type: activity_type.to_string(),
            input,
            correlation_token: ctx.correlation_token(),
            attempt: ctx.attempt(),
        });

        let (response, delay) = self.next_response(activity_type);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match response {
            Some(Response::Reply(result)) => result,
            Some(Response::Hang) => std::future::pending().await,
            None => Err(ActivityError::non_retryable(format!(
                "no scripted response for activity '{}'",
                activity_type
            ))),
        }
    }
}

impl std::fmt::Debug for MockActivityExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockActivityExecutor")
            .field("scripted", &self.inner.scripts.lock().len())
            .field("calls", &self.inner.calls.lock().len())
            .finish()
    }
}
