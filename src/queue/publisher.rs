//! Fan-out publisher
//!
//! Replicates every accepted item into the channel of each consumer group
//! registered at publish time, in registration order. A full channel either
//! holds the publisher back (the default backpressure) or, with
//! drop-on-full enabled, loses the item for that one group only.

use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::queue::channel::{ConsumerChannel, Offer};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::message::Message;
use crate::queue::metrics::{GroupStats, GroupStatsSnapshot, QueueMetrics};
use crate::queue::monitor::ThrottleState;
use crate::queue::processor::{ProcessorState, StateCell};
use std::sync::{Arc, RwLock};

/// What happened to a published item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Offered to every registered group
    Accepted,
    /// Rejected because the CPU throttle was engaged
    Discarded,
}

/// One row of the registration table
pub(crate) struct Registration<T> {
    pub name: String,
    pub channel: ConsumerChannel<T>,
    pub stats: Arc<GroupStats>,
    pub state: StateCell,
}

impl<T> Registration<T> {
    pub fn snapshot(&self) -> GroupStatsSnapshot {
        GroupStatsSnapshot {
            queued: self.channel.len(),
            ..self.stats.snapshot()
        }
    }

    pub fn state(&self) -> ProcessorState {
        self.state.get()
    }
}

pub(crate) struct FanoutPublisher<T> {
    registrations: RwLock<Vec<Arc<Registration<T>>>>,
    throttle: ThrottleState,
    metrics: Arc<QueueMetrics>,
    drop_on_full: bool,
}

impl<T> FanoutPublisher<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(throttle: ThrottleState, metrics: Arc<QueueMetrics>, drop_on_full: bool) -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            throttle,
            metrics,
            drop_on_full,
        }
    }

    /// Run `register` with exclusive access to the registration table
    pub fn with_table<R>(
        &self,
        register: impl FnOnce(&mut Vec<Arc<Registration<T>>>) -> QueueResult<R>,
    ) -> QueueResult<R> {
        let mut table = handle_rwlock_write(self.registrations.write(), QueueError::synchronisation)?;
        register(&mut table)
    }

    /// Copy of the current table, in registration order
    pub fn targets(&self) -> QueueResult<Vec<Arc<Registration<T>>>> {
        let table = handle_rwlock_read(self.registrations.read(), QueueError::synchronisation)?;
        Ok(table.clone())
    }

    pub async fn publish(&self, item: T) -> QueueResult<PublishOutcome> {
        if self.throttle.is_engaged() {
            log::warn!("Queue throttled due to high CPU load, item discarded");
            return Ok(PublishOutcome::Discarded);
        }

        // Snapshot so the table lock is never held across an await
        let targets = self.targets()?;
        let message = Message::new(item);

        for target in &targets {
            let outcome = if self.drop_on_full {
                target.channel.try_offer(message.clone())
            } else {
                target.channel.offer(message.clone()).await
            };

            match outcome {
                Offer::Delivered => {}
                Offer::Dropped => {
                    target.stats.record_dropped();
                    log::warn!(
                        "Consumer group '{}' queue is full ({} items), item dropped",
                        target.name,
                        target.channel.capacity()
                    );
                }
                Offer::Closed => {
                    log::debug!(
                        "Consumer group '{}' is no longer reading, item skipped",
                        target.name
                    );
                }
            }
        }

        self.metrics.record_accepted();
        Ok(PublishOutcome::Accepted)
    }
}
