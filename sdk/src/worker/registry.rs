//! WorkflowRegistry - Registry for workflow definitions

use crate::error::{DurableError, Result};
use crate::workflow::context::WorkflowContext;
use crate::workflow::definition::WorkflowDefinition;
use durable_core::WorkflowMetadata;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for boxed workflow execution functions
pub type BoxedWorkflowFn = Box<
    dyn Fn(Arc<dyn WorkflowContext>, Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>>
        + Send
        + Sync,
>;

/// A registered workflow with its metadata and execution function
pub struct RegisteredWorkflow {
    /// Workflow metadata
    pub metadata: WorkflowMetadata,
    execute_fn: BoxedWorkflowFn,
}

impl RegisteredWorkflow {
    /// Create a new registered workflow
    pub fn new(metadata: WorkflowMetadata, execute_fn: BoxedWorkflowFn) -> Self {
        Self {
            metadata,
            execute_fn,
        }
    }

    /// Run the workflow function once against a context
    pub async fn execute(&self, ctx: Arc<dyn WorkflowContext>, input: Value) -> Result<Value> {
        (self.execute_fn)(ctx, input).await
    }
}

impl std::fmt::Debug for RegisteredWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredWorkflow")
            .field("metadata", &self.metadata)
            .field("execute_fn", &"<function>")
            .finish()
    }
}

/// Registry mapping workflow type names to their definitions.
///
/// Passed to the engine and the replayer at construction; there is no
/// global registry.
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<String, Arc<RegisteredWorkflow>>>,
}

impl WorkflowRegistry {
    /// Create a new empty workflow registry
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
        }
    }

    /// Register a workflow with metadata and execution function
    pub fn register_raw(&self, workflow: RegisteredWorkflow) -> Result<()> {
        let kind = workflow.metadata.kind.clone();
        let mut workflows = self.workflows.write();

        if workflows.contains_key(&kind) {
            return Err(DurableError::InvalidConfiguration(format!(
                "Workflow '{}' is already registered. Each workflow kind must be unique within an engine.",
                kind
            )));
        }

        workflows.insert(kind, Arc::new(workflow));
        Ok(())
    }

    /// Register a workflow definition.
    ///
    /// # Example
    ///
    /// ```ignore
    /// registry.register(BackgroundCheckWorkflow)?;
    /// ```
    pub fn register<W>(&self, workflow: W) -> Result<()>
    where
        W: WorkflowDefinition + 'static,
    {
        let metadata = workflow.metadata();
        let workflow = Arc::new(workflow);

        let execute_fn: BoxedWorkflowFn = Box::new(move |ctx, input| {
            let workflow = Arc::clone(&workflow);
            Box::pin(async move {
                let typed_input: W::Input = serde_json::from_value(input)?;
                let output = workflow.execute(ctx.as_ref(), typed_input).await?;
                Ok(serde_json::to_value(output)?)
            })
        });

        self.register_raw(RegisteredWorkflow::new(metadata, execute_fn))
    }

    /// Register an untyped workflow from a kind and a closure
    pub fn register_simple<F, Fut>(&self, kind: &str, execute_fn: F) -> Result<()>
    where
        F: Fn(Arc<dyn WorkflowContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let boxed_fn: BoxedWorkflowFn = Box::new(move |ctx, input| Box::pin(execute_fn(ctx, input)));
        self.register_raw(RegisteredWorkflow::new(
            WorkflowMetadata::new(kind),
            boxed_fn,
        ))
    }

    /// Get a registered workflow by kind
    pub fn get(&self, kind: &str) -> Option<Arc<RegisteredWorkflow>> {
        self.workflows.read().get(kind).cloned()
    }

    /// Get a registered workflow or fail with `WorkflowNotRegistered`
    pub fn require(&self, kind: &str) -> Result<Arc<RegisteredWorkflow>> {
        self.get(kind)
            .ok_or_else(|| DurableError::WorkflowNotRegistered(kind.to_string()))
    }

    /// Check if a workflow kind is registered
    pub fn has(&self, kind: &str) -> bool {
        self.workflows.read().contains_key(kind)
    }

    /// Get all registered workflow kinds
    pub fn get_registered_kinds(&self) -> Vec<String> {
        self.workflows.read().keys().cloned().collect()
    }

    /// Get all workflow metadata
    pub fn get_all_metadata(&self) -> Vec<WorkflowMetadata> {
        self.workflows
            .read()
            .values()
            .map(|w| w.metadata.clone())
            .collect()
    }

    /// Get the number of registered workflows
    pub fn len(&self) -> usize {
        self.workflows.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.workflows.read().is_empty()
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflows", &self.get_registered_kinds())
            .finish()
    }
}
