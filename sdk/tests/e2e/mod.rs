//! End-to-end tests for durable-sdk
//!
//! Each test builds a [`DurableEngine`](durable_sdk::DurableEngine) over an
//! in-memory history store and a scripted activity executor, and runs under
//! paused tokio time so timers and timeouts resolve without waiting.
//!
//! # Running E2E tests
//!
//! ```bash
//! RUST_LOG=durable_sdk=debug cargo test --test e2e -p durable-sdk
//! ```

mod fixtures;
mod hook_tests;
mod recovery_tests;
mod retry_tests;
mod saga_tests;
mod timeout_tests;

use durable_sdk::testing::MockActivityExecutor;
use durable_sdk::{DurableEngine, DurableEngineBuilder, HistoryStore, InMemoryHistoryStore};
use std::sync::Arc;
use std::time::Duration;

/// Initialize tracing once for all tests
static TRACING_INITIALIZED: std::sync::Once = std::sync::Once::new();

fn init_tracing() {
    TRACING_INITIALIZED.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_test_writer()
            .init();
    });
}

/// Builder preloaded with every fixture workflow and the given executor.
pub fn engine_builder(
    store: Arc<dyn HistoryStore>,
    executor: MockActivityExecutor,
) -> DurableEngineBuilder {
    init_tracing();
    fixtures::register_all(DurableEngine::builder())
        .store(store)
        .activity_executor(executor)
}

/// Engine over a fresh in-memory store.
pub fn engine(executor: MockActivityExecutor) -> DurableEngine {
    engine_builder(Arc::new(InMemoryHistoryStore::new()), executor)
        .build()
        .expect("Failed to build engine")
}

/// Let spawned execution tasks run until they block.
///
/// Time is paused in every test, so this only advances the virtual clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
