//! WorkflowDefinition trait

use crate::error::Result;
use crate::workflow::context::WorkflowContext;
use async_trait::async_trait;
use durable_core::WorkflowMetadata;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Definition of a workflow with typed input and output.
///
/// The `execute` body is re-run from the start every time the execution is
/// driven, so it must be deterministic: all time, randomness and external
/// effects go through the [`WorkflowContext`].
///
/// Input and output types implement `JsonSchema` so schemas can be published
/// with the workflow's metadata.
#[async_trait]
pub trait WorkflowDefinition: Send + Sync {
    /// Input type for the workflow
    type Input: Serialize + DeserializeOwned + JsonSchema + Send;
    /// Output type for the workflow
    type Output: Serialize + DeserializeOwned + JsonSchema + Send;

    /// Unique identifier for this workflow type
    fn kind(&self) -> &str;

    /// Execute the workflow with the given context and input
    async fn execute(&self, ctx: &dyn WorkflowContext, input: Self::Input) -> Result<Self::Output>;

    /// Human-readable name for the workflow (defaults to kind)
    fn name(&self) -> &str {
        self.kind()
    }

    /// Version of this workflow implementation
    fn version(&self) -> Option<&str> {
        None
    }

    /// Optional description of the workflow
    fn description(&self) -> Option<&str> {
        None
    }

    /// Execution timeout in seconds (None = the engine default)
    fn timeout_seconds(&self) -> Option<u64> {
        None
    }

    /// Whether this workflow observes cancellation requests
    fn cancellable(&self) -> bool {
        true
    }

    /// Tags for categorizing the workflow
    fn tags(&self) -> Vec<String> {
        vec![]
    }

    /// JSON Schema of the input, generated from the Input type
    fn input_schema(&self) -> Option<Value> {
        Some(generate_schema::<Self::Input>())
    }

    /// JSON Schema of the output, generated from the Output type
    fn output_schema(&self) -> Option<Value> {
        Some(generate_schema::<Self::Output>())
    }

    /// Metadata describing this workflow type
    fn metadata(&self) -> WorkflowMetadata {
        let mut metadata = WorkflowMetadata::new(self.kind())
            .with_name(self.name())
            .with_tags(self.tags())
            .with_cancellable(self.cancellable());
        if let Some(version) = self.version() {
            metadata = metadata.with_version(version);
        }
        if let Some(description) = self.description() {
            metadata = metadata.with_description(description);
        }
        if let Some(timeout) = self.timeout_seconds() {
            metadata = metadata.with_timeout_seconds(timeout);
        }
        metadata
    }
}

/// Generate JSON Schema from a type that implements JsonSchema.
pub fn generate_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema).unwrap_or(Value::Null)
}
