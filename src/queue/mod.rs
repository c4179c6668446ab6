//! SmartQueue: in-process fan-out queue
//!
//! A generic producer/consumer queue that copies every published item to
//! each registered consumer group. Groups process their copies on their own
//! schedule, either one item at a time or in batches, with a per-group cap
//! on concurrently running handler tasks.
//!
//! # Overview
//!
//! - **Fan-out**: each group owns a bounded channel and receives every item
//!   published after it registered
//! - **Backpressure**: a full channel makes the publisher wait, or drops the
//!   item for that group alone when drop-on-full is enabled
//! - **Bounded parallelism**: a semaphore per group limits in-flight tasks
//! - **CPU throttle**: new items are discarded while process CPU usage sits
//!   at or above the configured threshold
//! - **Failure containment**: handler errors and panics are logged and
//!   counted, never propagated to the publisher or the drain loop
//! - **Graceful stop**: buffered items are optionally drained before the
//!   engine reports stopped
//!
//! # Architecture
//!
//! ```text
//!               publish(item)
//!                    │
//!          ┌─────────▼──────────┐      ┌────────────────┐
//!          │  FanoutPublisher   │◄─────│ CpuLoadMonitor │ (throttle flag)
//!          └──┬──────┬───────┬──┘      └────────────────┘
//!             │      │       │ one copy per group
//!        ┌────▼─┐ ┌──▼───┐ ┌─▼────┐
//!        │ chan │ │ chan │ │ chan │   bounded, max_queue_size
//!        └────┬─┘ └──┬───┘ └─┬────┘
//!        ┌────▼─┐ ┌──▼───┐ ┌─▼────┐
//!        │ loop │ │ loop │ │ loop │   ConsumerGroupProcessor
//!        └────┬─┘ └──┬───┘ └─┬────┘
//!          tasks   tasks   tasks      ≤ max_parallelism each
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use smartqueue::queue::api::{batch_fn, ConsumerGroupConfig, EngineOptions, SmartQueueEngine};
//!
//! # async fn example() -> Result<(), smartqueue::queue::api::QueueError> {
//! let engine = SmartQueueEngine::<u64>::new(EngineOptions::default())?;
//!
//! engine.register_consumer_group(
//!     ConsumerGroupConfig::new("totals")
//!         .with_batch_handler(batch_fn(|ids: Vec<u64>| async move {
//!             log::info!("received {} ids", ids.len());
//!             Ok(())
//!         }))
//!         .batched(100)
//!         .max_parallelism(4),
//! )?;
//!
//! for id in 0..1_000 {
//!     engine.publish(id).await?;
//! }
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
mod channel;
mod consumer;
mod engine;
mod error;
mod message;
mod metrics;
mod monitor;
mod options;
mod processor;
mod publisher;
mod traits;

pub use consumer::{ConsumerGroupConfig, ProcessingMode, MAX_PARALLELISM};
pub use engine::SmartQueueEngine;
pub use error::{QueueError, QueueResult};
pub use message::Message;
pub use metrics::{
    GroupStatsSnapshot, MetricsSnapshot, QueueMetrics, ENQUEUED_COUNTER, PROCESSED_COUNTER,
};
pub use monitor::{cpu_usage_percent, CpuLoadMonitor, ProcessCpuClock, ThrottleState};
pub use options::EngineOptions;
pub use processor::ProcessorState;
pub use publisher::PublishOutcome;
pub use traits::{
    batch_fn, item_fn, BatchFn, BatchHandler, CpuClock, HandlerError, HandlerResult, ItemFn,
    ItemHandler, MetricsSink,
};

#[cfg(test)]
mod tests;
