//! Consumer group configuration
//!
//! A consumer group receives its own copy of every item published after it
//! was registered. The configuration decides how the copy is processed: one
//! item per handler call, or batches of `batch_size` items per call.

use crate::queue::error::{QueueError, QueueResult};
use crate::queue::traits::{BatchHandler, ItemHandler};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Largest accepted `max_parallelism`: the drain waits for every permit at once
pub const MAX_PARALLELISM: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

/// How a consumer group hands items to its handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// One handler call per item
    #[default]
    Single,
    /// One handler call per `batch_size` items
    Batch,
}

/// Configuration for one consumer group
///
/// # Example
///
/// ```rust,no_run
/// use smartqueue::queue::{batch_fn, ConsumerGroupConfig};
/// use std::time::Duration;
///
/// let config = ConsumerGroupConfig::new("audit")
///     .with_batch_handler(batch_fn(|users: Vec<String>| async move {
///         log::info!("writing {} audit rows", users.len());
///         Ok(())
///     }))
///     .batched(50)
///     .max_parallelism(4)
///     .delay_between_batches(Duration::from_millis(100));
/// ```
pub struct ConsumerGroupConfig<T> {
    pub name: String,
    pub mode: ProcessingMode,
    pub batch_size: usize,
    pub max_parallelism: usize,
    pub delay_between_batches: Duration,
    pub delay_between_items: Duration,
    item_handler: Option<Arc<dyn ItemHandler<T>>>,
    batch_handler: Option<Arc<dyn BatchHandler<T>>>,
}

impl<T> Default for ConsumerGroupConfig<T> {
    fn default() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

impl<T> ConsumerGroupConfig<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: ProcessingMode::Single,
            batch_size: 10,
            max_parallelism: 2,
            delay_between_batches: Duration::ZERO,
            delay_between_items: Duration::ZERO,
            item_handler: None,
            batch_handler: None,
        }
    }

    /// Switch to batch mode with the given batch size
    pub fn batched(mut self, batch_size: usize) -> Self {
        self.mode = ProcessingMode::Batch;
        self.batch_size = batch_size;
        self
    }

    pub fn mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    pub fn delay_between_batches(mut self, delay: Duration) -> Self {
        self.delay_between_batches = delay;
        self
    }

    pub fn delay_between_items(mut self, delay: Duration) -> Self {
        self.delay_between_items = delay;
        self
    }

    pub fn with_item_handler(mut self, handler: impl ItemHandler<T> + 'static) -> Self {
        self.item_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_batch_handler(mut self, handler: impl BatchHandler<T> + 'static) -> Self {
        self.batch_handler = Some(Arc::new(handler));
        self
    }

    /// Validate the configuration and bind the handler matching the mode
    pub(crate) fn resolve(self) -> QueueResult<ResolvedGroup<T>> {
        if self.name.trim().is_empty() {
            return Err(QueueError::configuration(
                "consumer group name must not be empty",
            ));
        }
        if self.batch_size == 0 {
            return Err(QueueError::configuration(format!(
                "consumer group '{}': batch size must be greater than 0",
                self.name
            )));
        }
        if self.max_parallelism == 0 {
            return Err(QueueError::configuration(format!(
                "consumer group '{}': max parallelism must be at least 1",
                self.name
            )));
        }
        if self.max_parallelism > MAX_PARALLELISM {
            return Err(QueueError::configuration(format!(
                "consumer group '{}': max parallelism must not exceed {}, got {}",
                self.name, MAX_PARALLELISM, self.max_parallelism
            )));
        }

        let processor = match self.mode {
            ProcessingMode::Single => match self.item_handler {
                Some(handler) => GroupProcessor::Item(handler),
                None => {
                    return Err(QueueError::configuration(format!(
                        "consumer group '{}' uses single mode but has no item handler",
                        self.name
                    )))
                }
            },
            ProcessingMode::Batch => match self.batch_handler {
                Some(handler) => GroupProcessor::Batch(handler),
                None => {
                    return Err(QueueError::configuration(format!(
                        "consumer group '{}' uses batch mode but has no batch handler",
                        self.name
                    )))
                }
            },
        };

        Ok(ResolvedGroup {
            settings: GroupSettings {
                name: self.name,
                batch_size: match self.mode {
                    ProcessingMode::Single => 1,
                    ProcessingMode::Batch => self.batch_size,
                },
                max_parallelism: self.max_parallelism,
                delay_between_batches: self.delay_between_batches,
                delay_between_items: self.delay_between_items,
            },
            processor,
        })
    }
}

impl<T> fmt::Debug for ConsumerGroupConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerGroupConfig")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("batch_size", &self.batch_size)
            .field("max_parallelism", &self.max_parallelism)
            .field("delay_between_batches", &self.delay_between_batches)
            .field("delay_between_items", &self.delay_between_items)
            .field("item_handler", &self.item_handler.is_some())
            .field("batch_handler", &self.batch_handler.is_some())
            .finish()
    }
}

/// The processing capability bound to a group at registration
pub(crate) enum GroupProcessor<T> {
    Item(Arc<dyn ItemHandler<T>>),
    Batch(Arc<dyn BatchHandler<T>>),
}

impl<T> Clone for GroupProcessor<T> {
    fn clone(&self) -> Self {
        match self {
            GroupProcessor::Item(handler) => GroupProcessor::Item(Arc::clone(handler)),
            GroupProcessor::Batch(handler) => GroupProcessor::Batch(Arc::clone(handler)),
        }
    }
}

/// Validated, immutable group settings
#[derive(Debug, Clone)]
pub(crate) struct GroupSettings {
    pub name: String,
    /// Effective dispatch size; 1 in single mode
    pub batch_size: usize,
    pub max_parallelism: usize,
    pub delay_between_batches: Duration,
    pub delay_between_items: Duration,
}

pub(crate) struct ResolvedGroup<T> {
    pub settings: GroupSettings,
    pub processor: GroupProcessor<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::traits::{batch_fn, item_fn};

    fn noop_item() -> impl ItemHandler<u32> {
        item_fn(|_: u32| async { Ok(()) })
    }

    fn noop_batch() -> impl BatchHandler<u32> {
        batch_fn(|_: Vec<u32>| async { Ok(()) })
    }

    fn expect_configuration_error(config: ConsumerGroupConfig<u32>, fragment: &str) {
        match config.resolve() {
            Err(QueueError::Configuration { message }) => assert!(
                message.contains(fragment),
                "expected '{fragment}' in '{message}'"
            ),
            Err(other) => panic!("Expected configuration error, got {other:?}"),
            Ok(_) => panic!("Expected configuration error containing '{fragment}'"),
        }
    }

    #[test]
    fn test_defaults_match_single_mode() {
        let config: ConsumerGroupConfig<u32> = ConsumerGroupConfig::default();
        assert_eq!(config.mode, ProcessingMode::Single);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_parallelism, 2);
        assert_eq!(config.delay_between_batches, Duration::ZERO);
        assert!(uuid::Uuid::parse_str(&config.name).is_ok());
    }

    #[test]
    fn test_single_mode_resolves_with_unit_batches() {
        let resolved = ConsumerGroupConfig::new("single")
            .with_item_handler(noop_item())
            .resolve()
            .unwrap();

        assert_eq!(resolved.settings.name, "single");
        assert_eq!(resolved.settings.batch_size, 1);
        assert!(matches!(resolved.processor, GroupProcessor::Item(_)));
    }

    #[test]
    fn test_batch_mode_resolves_batch_handler() {
        let resolved = ConsumerGroupConfig::new("batch")
            .with_batch_handler(noop_batch())
            .with_item_handler(noop_item())
            .batched(25)
            .resolve()
            .unwrap();

        assert_eq!(resolved.settings.batch_size, 25);
        assert!(matches!(resolved.processor, GroupProcessor::Batch(_)));
    }

    #[test]
    fn test_missing_handler_fails_fast() {
        expect_configuration_error(
            ConsumerGroupConfig::new("batch-only").with_item_handler(noop_item()).batched(5),
            "no batch handler",
        );
        expect_configuration_error(
            ConsumerGroupConfig::new("single-only").with_batch_handler(noop_batch()),
            "no item handler",
        );
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        expect_configuration_error(
            ConsumerGroupConfig::new("zero-batch")
                .with_batch_handler(noop_batch())
                .batched(0),
            "batch size",
        );
        expect_configuration_error(
            ConsumerGroupConfig::new("zero-workers")
                .with_item_handler(noop_item())
                .max_parallelism(0),
            "max parallelism",
        );
        expect_configuration_error(
            ConsumerGroupConfig::new("  ").with_item_handler(noop_item()),
            "must not be empty",
        );
    }

    #[test]
    fn test_parallelism_above_semaphore_limit_rejected() {
        expect_configuration_error(
            ConsumerGroupConfig::new("huge")
                .with_item_handler(noop_item())
                .max_parallelism(usize::MAX),
            "must not exceed",
        );
        expect_configuration_error(
            ConsumerGroupConfig::new("just-over")
                .with_item_handler(noop_item())
                .max_parallelism(MAX_PARALLELISM + 1),
            "must not exceed",
        );
        assert!(ConsumerGroupConfig::new("at-limit")
            .with_item_handler(noop_item())
            .max_parallelism(MAX_PARALLELISM)
            .resolve()
            .is_ok());
    }
}
