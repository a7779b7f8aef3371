//! Durable SDK Samples
//!
//! Runs each sample scenario against an in-memory engine and logs what
//! happened. Useful settings:
//! - `SAMPLE_SSN`: SSN passed to the background checks
//! - `SAMPLE_TIMER_SECONDS`: delay used by the variable timer workflow
//! - `RUST_LOG`: log filter, e.g. `durable_sdk=debug`
//!
//! Settings are also read from the file named by `DOTENV_PATH`, or `.env`.

use durable_samples::background_check::BackgroundCheckWorkflow;
use durable_samples::register_samples;
use durable_samples::trip_booking::{TripRequest, TripSummary};
use durable_samples::variable_timer::{DelayedCheckInput, DelayedCheckOutput};
use durable_samples::work_queue::{QueueSummary, WorkItem, ADD, COMPLETE, SHUTDOWN};
use durable_sdk::prelude::*;
use tracing::{info, warn};

/// How many replays the non-determinism demo tries before giving up
const REPLAY_ATTEMPTS: usize = 32;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    if let Ok(dotenv_path) = std::env::var("DOTENV_PATH") {
        dotenvy::from_filename(&dotenv_path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("durable_samples=info".parse()?)
                .add_directive("durable_sdk=info".parse()?),
        )
        .init();

    let ssn = std::env::var("SAMPLE_SSN").unwrap_or_else(|_| "555-55-5555".to_string());
    let timer_seconds: u64 = std::env::var("SAMPLE_TIMER_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3);

    let engine = register_samples(DurableEngine::builder())
        .register_hook(LoggingHook::info())
        .build()?;

    info!("Starting durable SDK samples");

    background_check(&engine, &ssn).await?;
    variable_timer(&engine, &ssn, timer_seconds).await?;
    non_deterministic(&engine, &ssn).await?;
    trip_booking(&engine).await?;
    work_queue(&engine).await?;

    engine.shutdown().await;
    info!("Samples finished");
    Ok(())
}

/// Run a background check, then replay its history without dispatching
async fn background_check(engine: &DurableEngine, ssn: &str) -> Result<()> {
    let id = engine.start("background-check", ssn).await?;
    let result: String = engine.get_result_as(&id).await?;
    info!(workflow_id = %id, result = %result, "Background check finished");

    let history = engine.history(&id).await?;
    let replay = engine
        .replayer()
        .replay(BackgroundCheckWorkflow.kind(), &history)
        .await?;
    info!(
        events = history.len(),
        dispatched = replay.dispatched_activities(),
        output = ?replay.output,
        "Replayed background check"
    );
    Ok(())
}

async fn variable_timer(engine: &DurableEngine, ssn: &str, delay_seconds: u64) -> Result<()> {
    let input = DelayedCheckInput {
        ssn: ssn.to_string(),
        delay_seconds,
    };
    let id = engine
        .start("variable-timer-background-check", input)
        .await?;
    let output: DelayedCheckOutput = engine.get_result_as(&id).await?;
    info!(
        workflow_id = %id,
        result = %output.result,
        checked_at = output.checked_at,
        "Delayed check finished"
    );
    Ok(())
}

/// Show how live randomness breaks replay
async fn non_deterministic(engine: &DurableEngine, ssn: &str) -> Result<()> {
    let id = engine
        .start("non-deterministic-background-check", ssn)
        .await?;
    match engine.get_result(&id).await {
        Ok(output) => info!(workflow_id = %id, output = %output, "Run happened to complete"),
        Err(e) => {
            warn!(workflow_id = %id, error = %e, "Run diverged from its own history");
            return Ok(());
        }
    }

    let history = engine.history(&id).await?;
    let replayer = engine.replayer();
    for attempt in 1..=REPLAY_ATTEMPTS {
        match replayer
            .replay("non-deterministic-background-check", &history)
            .await
        {
            Err(DurableError::NonDeterminism(violation)) => {
                warn!(attempt, violation = %violation, "Replay detected non-determinism");
                return Ok(());
            }
            Err(e) => return Err(e),
            Ok(_) => continue,
        }
    }
    info!(
        attempts = REPLAY_ATTEMPTS,
        "Every replay took the recorded branch"
    );
    Ok(())
}

/// Book one trip cleanly and one that fails at the flight
async fn trip_booking(engine: &DurableEngine) -> Result<()> {
    for (trip_id, fail_at) in [("trip-1", None), ("trip-2", Some("book-flight"))] {
        let request = TripRequest {
            trip_id: trip_id.to_string(),
            fail_at: fail_at.map(str::to_string),
        };
        let id = engine.start("trip-booking", request).await?;
        let summary: TripSummary = engine.get_result_as(&id).await?;
        info!(
            trip_id = %summary.trip_id,
            booked = summary.booked,
            confirmations = ?summary.confirmations,
            compensations = ?summary.compensations,
            "Trip booking finished"
        );
    }
    Ok(())
}

async fn work_queue(engine: &DurableEngine) -> Result<()> {
    let id = engine.start("work-queue", ()).await?;

    for n in 1..=3 {
        let item = WorkItem {
            id: format!("item-{}", n),
            description: format!("Review document {}", n),
        };
        engine.signal(&id, ADD, item).await?;
    }
    engine.signal(&id, COMPLETE, "item-2").await?;

    let queue: Vec<WorkItem> = engine.query_as(&id, "queue").await?;
    info!(pending = queue.len(), "Queried work queue");

    engine.signal(&id, SHUTDOWN, Value::Null).await?;
    let summary: QueueSummary = engine.get_result_as(&id).await?;
    info!(
        completed = ?summary.completed,
        abandoned = summary.abandoned.len(),
        "Work queue shut down"
    );
    Ok(())
}
