//! Configuration presets for the durable engine
//!
//! Sensible defaults plus presets for common deployments.

use std::time::Duration;

/// Configuration for a [`DurableEngine`](crate::client::DurableEngine)
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Maximum number of activity attempts running concurrently across all executions
    pub max_concurrent_activities: usize,
    /// Capacity of each execution's inbound event mailbox
    pub signal_buffer_size: usize,
    /// How long a finished execution's query snapshot stays answerable
    pub snapshot_retention: Duration,
    /// Validate every re-run of workflow code against its recorded history
    pub enable_determinism_validation: bool,
    /// Execution timeout applied when a start request names none
    pub default_execution_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl EngineConfig {
    /// Default configuration suitable for most use cases
    pub const DEFAULT: Self = Self {
        max_concurrent_activities: 20,
        signal_buffer_size: 128,
        snapshot_retention: Duration::from_secs(300), // 5 minutes
        enable_determinism_validation: true,
        default_execution_timeout: None,
    };

    /// High-throughput configuration for heavy workloads
    pub const HIGH_THROUGHPUT: Self = Self {
        max_concurrent_activities: 100,
        signal_buffer_size: 1024,
        snapshot_retention: Duration::from_secs(60),
        enable_determinism_validation: true,
        default_execution_timeout: None,
    };

    /// Low-resource configuration for constrained environments
    pub const LOW_RESOURCE: Self = Self {
        max_concurrent_activities: 2,
        signal_buffer_size: 16,
        snapshot_retention: Duration::from_secs(30),
        enable_determinism_validation: true,
        default_execution_timeout: None,
    };

    /// Create a new configuration with validation
    pub fn new(
        max_concurrent_activities: usize,
        signal_buffer_size: usize,
        snapshot_retention: Duration,
        enable_determinism_validation: bool,
    ) -> Result<Self, ConfigError> {
        if max_concurrent_activities == 0 {
            return Err(ConfigError::InvalidValue(
                "max_concurrent_activities must be positive".to_string(),
            ));
        }
        if signal_buffer_size == 0 {
            return Err(ConfigError::InvalidValue(
                "signal_buffer_size must be positive".to_string(),
            ));
        }

        Ok(Self {
            max_concurrent_activities,
            signal_buffer_size,
            snapshot_retention,
            enable_determinism_validation,
            default_execution_timeout: None,
        })
    }

    /// Set the default execution timeout
    pub fn with_default_execution_timeout(mut self, timeout: Duration) -> Self {
        self.default_execution_timeout = Some(timeout);
        self
    }

    /// Set the snapshot retention window
    pub fn with_snapshot_retention(mut self, retention: Duration) -> Self {
        self.snapshot_retention = retention;
        self
    }
}

/// Configuration error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
