//! Engine-wide options shared by every consumer group of one queue

use crate::queue::error::{QueueError, QueueResult};
use serde::Deserialize;
use std::time::Duration;

/// Options fixed when a `SmartQueueEngine` is created
///
/// Can be deserialised from the `[queue]` table of the application
/// configuration file; missing keys take their defaults.
///
/// ```toml
/// [queue]
/// max-queue-size = 10000
/// cpu-threshold = 85
/// drop-on-full-queue = false
/// auto-drain-on-shutdown = true
/// cpu-check-interval-ms = 3000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineOptions {
    /// Capacity of every consumer channel
    pub max_queue_size: usize,
    /// Process CPU percentage (0..=100) at or above which publishes are discarded
    pub cpu_threshold: u8,
    /// Drop an item for a group whose channel is full instead of waiting
    pub drop_on_full_queue: bool,
    /// Process whatever is still buffered when the engine stops
    pub auto_drain_on_shutdown: bool,
    /// Interval between CPU samples
    pub cpu_check_interval_ms: u64,
    /// Back-off applied by a drain loop when its channel is empty
    pub idle_poll_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_queue_size: 10_000,
            cpu_threshold: 75,
            drop_on_full_queue: false,
            auto_drain_on_shutdown: true,
            cpu_check_interval_ms: 2_000,
            idle_poll_ms: 10,
        }
    }
}

impl EngineOptions {
    pub fn validate(&self) -> QueueResult<()> {
        if self.max_queue_size == 0 {
            return Err(QueueError::configuration(
                "max-queue-size must be greater than 0",
            ));
        }
        if self.cpu_threshold > 100 {
            return Err(QueueError::configuration(format!(
                "cpu-threshold must be between 0 and 100, got {}",
                self.cpu_threshold
            )));
        }
        if self.cpu_check_interval_ms == 0 {
            return Err(QueueError::configuration(
                "cpu-check-interval-ms must be greater than 0",
            ));
        }
        if self.idle_poll_ms == 0 {
            return Err(QueueError::configuration(
                "idle-poll-ms must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn cpu_check_interval(&self) -> Duration {
        Duration::from_millis(self.cpu_check_interval_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = EngineOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.max_queue_size, 10_000);
        assert_eq!(options.cpu_threshold, 75);
        assert!(!options.drop_on_full_queue);
        assert!(options.auto_drain_on_shutdown);
        assert_eq!(options.cpu_check_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            EngineOptions {
                max_queue_size: 0,
                ..Default::default()
            },
            EngineOptions {
                cpu_threshold: 101,
                ..Default::default()
            },
            EngineOptions {
                cpu_check_interval_ms: 0,
                ..Default::default()
            },
            EngineOptions {
                idle_poll_ms: 0,
                ..Default::default()
            },
        ];

        for options in cases {
            match options.validate() {
                Err(QueueError::Configuration { .. }) => {}
                other => panic!("Expected configuration error for {options:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_threshold_boundaries_accepted() {
        for cpu_threshold in [0, 100] {
            let options = EngineOptions {
                cpu_threshold,
                ..Default::default()
            };
            assert!(options.validate().is_ok());
        }
    }

    #[test]
    fn test_deserialise_partial_table() {
        let options: EngineOptions = toml::from_str(
            r#"
            max-queue-size = 5
            cpu-threshold = 100
            drop-on-full-queue = true
            "#,
        )
        .unwrap();

        assert_eq!(options.max_queue_size, 5);
        assert_eq!(options.cpu_threshold, 100);
        assert!(options.drop_on_full_queue);
        assert!(options.auto_drain_on_shutdown);
        assert_eq!(options.cpu_check_interval_ms, 2_000);
    }

    #[test]
    fn test_deserialise_rejects_unknown_keys() {
        let result: Result<EngineOptions, _> = toml::from_str("max-queue-sise = 5");
        assert!(result.is_err());
    }
}
