//! Tunable queue settings.

use crate::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// How tail positions are assigned when an entry joins a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Allocate and write in one store call; concurrent appends never collide
    #[default]
    Atomic,
    /// Read the current maximum, then write in a second call
    ///
    /// Two sessions racing on the same partition may both compute the same
    /// position.
    ReadThenWrite,
}

/// Queue behaviour settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Poll reconciler cadence in milliseconds
    pub poll_interval_ms: u64,

    /// Nominal waiting-room duration in milliseconds
    pub expiry_duration_ms: u64,

    /// Countdown refresh cadence in milliseconds
    pub expiry_refresh_ms: u64,

    /// Buffered change events per change-feed receiver
    pub change_feed_capacity: usize,

    /// Position allocation strategy
    pub allocation: AllocationStrategy,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            expiry_duration_ms: 300_000,
            expiry_refresh_ms: 1_000,
            change_feed_capacity: 256,
            allocation: AllocationStrategy::Atomic,
        }
    }
}

impl QueueSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn expiry_duration(&self) -> Duration {
        Duration::from_millis(self.expiry_duration_ms)
    }

    pub fn expiry_refresh(&self) -> Duration {
        Duration::from_millis(self.expiry_refresh_ms)
    }

    /// Reject settings that would stall a loop or disable the feed
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let checks = [
            ("poll_interval_ms", self.poll_interval_ms == 0),
            ("expiry_duration_ms", self.expiry_duration_ms == 0),
            ("expiry_refresh_ms", self.expiry_refresh_ms == 0),
            ("change_feed_capacity", self.change_feed_capacity == 0),
        ];

        for (key, is_zero) in checks {
            if is_zero {
                return Err(ConfigurationError::Invalid {
                    key: key.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }
}
