//! Testing utilities for workflows and activities.
//!
//! - [`HistoryBuilder`] assembles histories for replay tests.
//! - [`MockActivityExecutor`] stands in for real activities behind the engine.

mod builders;
mod mock_activity_executor;

pub use builders::HistoryBuilder;
pub use mock_activity_executor::{MockActivityExecutor, RecordedCall};
