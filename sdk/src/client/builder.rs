//! DurableEngine builder for fluent configuration

use crate::activity::definition::{ActivityDefinition, ActivityError};
use crate::activity::gateway::{ActivityExecutor, ActivityGateway, RegistryActivityExecutor};
use crate::activity::registry::ActivityRegistry;
use crate::activity::ActivityContext;
use crate::client::engine::DurableEngine;
use crate::client::hook::{CompositeWorkflowHook, NoOpHook, WorkflowHook};
use crate::config::EngineConfig;
use crate::error::{DurableError, Result};
use crate::worker::registry::WorkflowRegistry;
use crate::worker::scheduler::WorkflowScheduler;
use crate::worker::timer::{Clock, RuntimeClock};
use crate::worker::workflow_worker::ExecutionServices;
use crate::workflow::context::WorkflowContext;
use crate::workflow::definition::WorkflowDefinition;
use durable_core::{HistoryStore, InMemoryHistoryStore};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating DurableEngine instances
///
/// Example:
/// ```ignore
/// let engine = DurableEngine::builder()
///     .config(EngineConfig::HIGH_THROUGHPUT)
///     .store(Arc::new(InMemoryHistoryStore::new()))
///     .register_workflow(MyWorkflow)
///     .register_activity(MyActivity)
///     .build()?;
/// ```
pub struct DurableEngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn HistoryStore>>,
    executor: Option<Arc<dyn ActivityExecutor>>,
    clock: Option<Arc<dyn Clock>>,
    workflow_registry: WorkflowRegistry,
    activity_registry: ActivityRegistry,
    hooks: Vec<Box<dyn WorkflowHook>>,
    registration_error: Option<DurableError>,
}

impl Default for DurableEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableEngineBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            store: None,
            executor: None,
            clock: None,
            workflow_registry: WorkflowRegistry::new(),
            activity_registry: ActivityRegistry::new(),
            hooks: Vec::new(),
            registration_error: None,
        }
    }

    /// Set the complete engine configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set maximum concurrent activity attempts
    pub fn max_concurrent_activities(mut self, max: usize) -> Self {
        self.config.max_concurrent_activities = max;
        self
    }

    /// Set how long finished executions keep answering queries
    pub fn snapshot_retention(mut self, retention: Duration) -> Self {
        self.config.snapshot_retention = retention;
        self
    }

    /// Set the history store
    ///
    /// Default: a fresh [`InMemoryHistoryStore`]
    pub fn store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the registry-backed activity executor
    ///
    /// Registered activities are ignored once an executor is set.
    pub fn activity_executor(mut self, executor: impl ActivityExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// Set the clock used for event timestamps and timers
    ///
    /// Default: [`RuntimeClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register a workflow lifecycle hook for observability
    ///
    /// Hooks receive notifications about workflow execution events.
    pub fn register_hook(mut self, hook: impl WorkflowHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Register a workflow definition
    pub fn register_workflow<W>(mut self, workflow: W) -> Self
    where
        W: WorkflowDefinition + 'static,
    {
        let result = self.workflow_registry.register(workflow);
        self.keep_first_error(result);
        self
    }

    /// Register an untyped workflow from a kind and a closure
    pub fn register_workflow_fn<F, Fut>(mut self, kind: &str, execute_fn: F) -> Self
    where
        F: Fn(Arc<dyn WorkflowContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let result = self.workflow_registry.register_simple(kind, execute_fn);
        self.keep_first_error(result);
        self
    }

    /// Register an activity definition
    pub fn register_activity<A>(mut self, activity: A) -> Self
    where
        A: ActivityDefinition + 'static,
    {
        let result = self.activity_registry.register(activity);
        self.keep_first_error(result);
        self
    }

    /// Register an untyped activity from a kind and a closure
    pub fn register_activity_fn<F, Fut>(mut self, kind: &str, execute_fn: F) -> Self
    where
        F: Fn(ActivityContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, ActivityError>> + Send + 'static,
    {
        let result = self.activity_registry.register_simple(kind, execute_fn);
        self.keep_first_error(result);
        self
    }

    // Registration errors surface from build()
    fn keep_first_error(&mut self, result: Result<()>) {
        if let Err(e) = result {
            self.registration_error.get_or_insert(e);
        }
    }

    /// Build the DurableEngine
    pub fn build(self) -> Result<DurableEngine> {
        if let Some(e) = self.registration_error {
            return Err(e);
        }
        if self.config.max_concurrent_activities == 0 {
            return Err(DurableError::InvalidConfiguration(
                "max_concurrent_activities must be positive".to_string(),
            ));
        }
        if self.config.signal_buffer_size == 0 {
            return Err(DurableError::InvalidConfiguration(
                "signal_buffer_size must be positive".to_string(),
            ));
        }

        // Create composite hook if there are hooks
        let hook: Arc<dyn WorkflowHook> = if self.hooks.is_empty() {
            Arc::new(NoOpHook)
        } else if self.hooks.len() == 1 {
            // Unwrap the single hook
            let mut hooks = self.hooks;
            Arc::from(hooks.remove(0))
        } else {
            Arc::new(CompositeWorkflowHook::new(self.hooks))
        };

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(RuntimeClock::new()));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryHistoryStore::new()));
        let executor = self.executor.unwrap_or_else(|| {
            Arc::new(RegistryActivityExecutor::new(Arc::new(
                self.activity_registry,
            )))
        });

        let services = ExecutionServices {
            scheduler: WorkflowScheduler::new(self.config.enable_determinism_validation),
            gateway: Arc::new(ActivityGateway::new(
                executor,
                self.config.max_concurrent_activities,
                Arc::clone(&clock),
            )),
            hook,
            clock,
            mailbox_size: self.config.signal_buffer_size,
        };

        Ok(DurableEngine::new(
            self.config,
            store,
            Arc::new(self.workflow_registry),
            Arc::new(services),
        ))
    }
}
