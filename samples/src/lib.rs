//! Sample workflows for the durable SDK
//!
//! Each module is a self-contained scenario. [`register_samples`] wires
//! every workflow and activity into an engine builder.

pub mod background_check;
pub mod non_deterministic;
pub mod trip_booking;
pub mod variable_timer;
pub mod work_queue;

use durable_sdk::DurableEngineBuilder;

/// Register every sample workflow and activity
pub fn register_samples(builder: DurableEngineBuilder) -> DurableEngineBuilder {
    let builder = builder
        .register_workflow(background_check::BackgroundCheckWorkflow)
        .register_workflow(variable_timer::VariableTimerWorkflow)
        .register_workflow(non_deterministic::NonDeterministicWorkflow)
        .register_workflow(non_deterministic::SeededChoiceWorkflow)
        .register_workflow(trip_booking::TripBookingWorkflow)
        .register_workflow(work_queue::WorkQueueWorkflow)
        .register_activity(background_check::SsnTraceActivity)
        .register_activity(non_deterministic::CreditCheckActivity);

    trip_booking::SupplierActivity::all()
        .into_iter()
        .fold(builder, |builder, activity| builder.register_activity(activity))
}
