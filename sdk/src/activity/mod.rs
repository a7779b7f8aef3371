//! Activity definitions, registration and invocation

pub mod context;
pub mod definition;
pub mod gateway;
pub mod registry;

pub use context::ActivityContext;
pub use definition::{ActivityDefinition, ActivityError};
pub use gateway::{ActivityExecutor, ActivityGateway, RegistryActivityExecutor};
pub use registry::{ActivityMetadata, ActivityRegistry, BoxedActivityFn, RegisteredActivity};
