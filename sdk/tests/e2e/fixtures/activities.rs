//! Test activity definitions for E2E tests

use async_trait::async_trait;
use durable_sdk::activity::{ActivityContext, ActivityDefinition, ActivityError};

/// Checks an SSN against a fixed rule: numbers starting with `000` fail.
pub struct SsnTraceActivity;

#[async_trait]
impl ActivityDefinition for SsnTraceActivity {
    type Input = String;
    type Output = String;

    fn kind(&self) -> &str {
        "ssn-trace"
    }

    async fn execute(&self, ssn: String, _ctx: &ActivityContext) -> Result<String, ActivityError> {
        if ssn.starts_with("000") {
            return Err(ActivityError::non_retryable(format!("invalid SSN {}", ssn))
                .with_error_type("InvalidSsn"));
        }
        Ok("pass".to_string())
    }
}
