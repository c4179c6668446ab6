//! Public API for the queue system
//!
//! External modules should import from here rather than directly from
//! internal modules. See the module documentation for usage examples.

// Engine and its configuration
pub use crate::queue::consumer::{ConsumerGroupConfig, ProcessingMode, MAX_PARALLELISM};
pub use crate::queue::engine::SmartQueueEngine;
pub use crate::queue::options::EngineOptions;
pub use crate::queue::publisher::PublishOutcome;

// Message envelope
pub use crate::queue::message::Message;

// Processing capabilities and collaborators
pub use crate::queue::traits::{
    batch_fn, item_fn, BatchHandler, CpuClock, HandlerError, HandlerResult, ItemHandler,
    MetricsSink,
};

// Observability
pub use crate::queue::metrics::{GroupStatsSnapshot, MetricsSnapshot, QueueMetrics};
pub use crate::queue::processor::ProcessorState;

// Error handling
pub use crate::queue::error::{QueueError, QueueResult};
