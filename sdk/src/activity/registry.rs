//! ActivityRegistry - Registry for activity definitions

use crate::activity::context::ActivityContext;
use crate::activity::definition::{ActivityDefinition, ActivityError};
use crate::error::{DurableError, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Activity metadata extracted from an activity definition
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityMetadata {
    /// Unique activity kind identifier
    pub kind: String,
    /// Human-readable name
    pub name: String,
    /// Description of the activity
    pub description: Option<String>,
    /// Tags for categorization
    pub tags: Vec<String>,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
}

impl ActivityMetadata {
    fn bare(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: kind.to_string(),
            description: None,
            tags: vec![],
            input_schema: None,
            output_schema: None,
        }
    }
}

/// Type alias for boxed activity execution functions
pub type BoxedActivityFn = Box<
    dyn Fn(
            ActivityContext,
            Value,
        )
            -> Pin<Box<dyn Future<Output = std::result::Result<Value, ActivityError>> + Send>>
        + Send
        + Sync,
>;

/// A registered activity with its metadata and execution function
pub struct RegisteredActivity {
    /// Activity metadata
    pub metadata: ActivityMetadata,
    execute_fn: BoxedActivityFn,
}

impl RegisteredActivity {
    /// Create a new registered activity
    pub fn new(metadata: ActivityMetadata, execute_fn: BoxedActivityFn) -> Self {
        Self {
            metadata,
            execute_fn,
        }
    }

    /// Execute one attempt of the activity
    pub async fn execute(
        &self,
        ctx: ActivityContext,
        input: Value,
    ) -> std::result::Result<Value, ActivityError> {
        (self.execute_fn)(ctx, input).await
    }
}

impl std::fmt::Debug for RegisteredActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredActivity")
            .field("metadata", &self.metadata)
            .field("execute_fn", &"<function>")
            .finish()
    }
}

/// Registry mapping activity type names to their handlers.
///
/// Passed to the engine at construction; there is no global registry.
#[derive(Default)]
pub struct ActivityRegistry {
    activities: RwLock<HashMap<String, Arc<RegisteredActivity>>>,
}

impl ActivityRegistry {
    /// Create a new empty activity registry
    pub fn new() -> Self {
        Self {
            activities: RwLock::new(HashMap::new()),
        }
    }

    /// Register an activity with metadata and execution function
    pub fn register_raw(&self, activity: RegisteredActivity) -> Result<()> {
        let kind = activity.metadata.kind.clone();
        let mut activities = self.activities.write();

        if activities.contains_key(&kind) {
            return Err(DurableError::InvalidConfiguration(format!(
                "Activity '{}' is already registered. Each activity kind must be unique within an engine.",
                kind
            )));
        }

        activities.insert(kind, Arc::new(activity));
        Ok(())
    }

    /// Register an activity definition.
    ///
    /// Input that does not deserialize into the activity's input type fails
    /// the attempt with a non-retryable error.
    pub fn register<A>(&self, activity: A) -> Result<()>
    where
        A: ActivityDefinition + 'static,
    {
        let metadata = ActivityMetadata {
            kind: activity.kind().to_string(),
            name: activity.name().to_string(),
            description: activity.description().map(|s| s.to_string()),
            tags: activity.tags(),
            input_schema: activity.input_schema(),
            output_schema: activity.output_schema(),
        };

        let activity = Arc::new(activity);

        let execute_fn: BoxedActivityFn = Box::new(move |ctx, input| {
            let activity = Arc::clone(&activity);
            Box::pin(async move {
                let typed_input: A::Input = serde_json::from_value(input)?;
                let output = activity.execute(typed_input, &ctx).await?;
                Ok::<_, ActivityError>(serde_json::to_value(output)?)
            })
        });

        self.register_raw(RegisteredActivity::new(metadata, execute_fn))
    }

    /// Register a simple activity with just a kind and execution function
    pub fn register_simple<F, Fut>(&self, kind: &str, execute_fn: F) -> Result<()>
    where
        F: Fn(ActivityContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, ActivityError>> + Send + 'static,
    {
        let boxed_fn: BoxedActivityFn = Box::new(move |ctx, input| {
            let fut = execute_fn(ctx, input);
            Box::pin(fut)
        });

        self.register_raw(RegisteredActivity::new(
            ActivityMetadata::bare(kind),
            boxed_fn,
        ))
    }

    /// Get a registered activity by kind
    pub fn get(&self, kind: &str) -> Option<Arc<RegisteredActivity>> {
        self.activities.read().get(kind).cloned()
    }

    /// Check if an activity kind is registered
    pub fn has(&self, kind: &str) -> bool {
        self.activities.read().contains_key(kind)
    }

    /// Get all registered activity kinds
    pub fn get_registered_kinds(&self) -> Vec<String> {
        self.activities.read().keys().cloned().collect()
    }

    /// Get all activity metadata
    pub fn get_all_metadata(&self) -> Vec<ActivityMetadata> {
        self.activities
            .read()
            .values()
            .map(|a| a.metadata.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.activities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.read().is_empty()
    }
}

impl std::fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<_> = self.get_registered_kinds();
        f.debug_struct("ActivityRegistry")
            .field("activities", &kinds)
            .finish()
    }
}
