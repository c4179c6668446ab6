//! Consumer group drain loop
//!
//! One `ConsumerGroupProcessor` runs per registered group. It pops messages
//! from the group's channel in FIFO order, accumulates them into a batch and
//! hands each full batch to a spawned task. A semaphore sized to the group's
//! max parallelism bounds the number of tasks in flight; when every permit
//! is taken the loop itself waits, which paces ingestion for that group.
//!
//! Handler failures are contained inside the spawned task: they are logged
//! with the group name and counted, and the loop carries on.

use crate::core::shutdown::ShutdownSignal;
use crate::queue::channel::{ChannelReader, Pop};
use crate::queue::consumer::{GroupProcessor, GroupSettings};
use crate::queue::metrics::{GroupStats, QueueMetrics};
use crate::queue::traits::HandlerError;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Lifecycle of a drain loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Running,
    /// Stop observed; finishing the current iteration or the final drain
    Stopping,
    Stopped,
}

/// Shared view of a processor's state
#[derive(Debug, Clone)]
pub(crate) struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(0)))
    }

    pub fn get(&self) -> ProcessorState {
        match self.0.load(Ordering::Acquire) {
            0 => ProcessorState::Running,
            1 => ProcessorState::Stopping,
            _ => ProcessorState::Stopped,
        }
    }

    fn set(&self, state: ProcessorState) {
        let raw = match state {
            ProcessorState::Running => 0,
            ProcessorState::Stopping => 1,
            ProcessorState::Stopped => 2,
        };
        self.0.store(raw, Ordering::Release);
    }
}

/// Knobs the engine passes down to every processor
#[derive(Debug, Clone, Copy)]
pub(crate) struct DrainPolicy {
    pub idle_poll: Duration,
    pub auto_drain: bool,
}

pub(crate) struct ConsumerGroupProcessor<T> {
    settings: GroupSettings,
    processor: GroupProcessor<T>,
    reader: ChannelReader<T>,
    permits: Arc<Semaphore>,
    buffer: Vec<T>,
    stats: Arc<GroupStats>,
    metrics: Arc<QueueMetrics>,
    policy: DrainPolicy,
    state: StateCell,
}

impl<T> ConsumerGroupProcessor<T>
where
    T: Send + 'static,
{
    pub fn new(
        settings: GroupSettings,
        processor: GroupProcessor<T>,
        reader: ChannelReader<T>,
        stats: Arc<GroupStats>,
        metrics: Arc<QueueMetrics>,
        policy: DrainPolicy,
    ) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(settings.max_parallelism)),
            buffer: Vec::with_capacity(settings.batch_size),
            settings,
            processor,
            reader,
            stats,
            metrics,
            policy,
            state: StateCell::new(),
        }
    }

    pub fn state(&self) -> StateCell {
        self.state.clone()
    }

    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        log::debug!(
            "Consumer group '{}' started (batch size: {}, max parallelism: {})",
            self.settings.name,
            self.settings.batch_size,
            self.settings.max_parallelism
        );

        while !shutdown.is_requested() {
            match self.reader.try_pop() {
                Pop::Item(message) => {
                    self.buffer.push(message.into_payload());
                    if self.buffer.len() < self.settings.batch_size {
                        continue;
                    }
                    if !self.dispatch_buffer(&mut shutdown).await {
                        break;
                    }
                    let delay = self.settings.delay_between_batches;
                    if !delay.is_zero() && shutdown.sleep(delay).await {
                        break;
                    }
                }
                Pop::Empty => {
                    if shutdown.sleep(self.policy.idle_poll).await {
                        break;
                    }
                }
                Pop::Closed => {
                    log::debug!("Consumer group '{}' channel closed", self.settings.name);
                    break;
                }
            }
        }

        self.state.set(ProcessorState::Stopping);
        if self.policy.auto_drain {
            self.drain().await;
        } else {
            self.discard();
        }
        self.state.set(ProcessorState::Stopped);
        log::debug!("Consumer group '{}' stopped", self.settings.name);
    }

    /// Swap out the buffer and dispatch it once a permit is free
    ///
    /// Returns `false` if shutdown arrived while waiting for a permit; the
    /// batch is then put back so the final drain can still see it.
    async fn dispatch_buffer(&mut self, shutdown: &mut ShutdownSignal) -> bool {
        let batch = self.take_buffer();
        let permits = Arc::clone(&self.permits);
        let permit = tokio::select! {
            permit = permits.acquire_owned() => permit.ok(),
            _ = shutdown.cancelled() => None,
        };

        match permit {
            Some(permit) => {
                self.spawn_unit(batch, permit);
                true
            }
            None => {
                self.buffer = batch;
                false
            }
        }
    }

    fn take_buffer(&mut self) -> Vec<T> {
        std::mem::replace(&mut self.buffer, Vec::with_capacity(self.settings.batch_size))
    }

    fn spawn_unit(&self, batch: Vec<T>, permit: OwnedSemaphorePermit) {
        let name = self.settings.name.clone();
        let processor = self.processor.clone();
        let delay_between_items = self.settings.delay_between_items;
        let stats = Arc::clone(&self.stats);
        let metrics = Arc::clone(&self.metrics);

        stats.task_started();
        tokio::spawn(async move {
            let _permit = permit;
            let total = batch.len() as u64;
            let mut handled = 0u64;

            let outcome = AssertUnwindSafe(process_unit(
                &processor,
                batch,
                delay_between_items,
                &stats,
                &metrics,
                &mut handled,
            ))
            .catch_unwind()
            .await;

            let lost = total - handled;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    stats.record_failed(lost);
                    log::error!(
                        "Error processing messages in {}: {} ({} item(s) lost)",
                        name,
                        error,
                        lost
                    );
                }
                Err(panic) => {
                    stats.record_failed(lost);
                    log::error!(
                        "Handler panicked in {}: {} ({} item(s) lost)",
                        name,
                        panic_message(panic.as_ref()),
                        lost
                    );
                }
            }
            stats.task_finished();
        });
    }

    /// Final pass on shutdown: process everything already buffered
    async fn drain(&mut self) {
        self.reader.close();

        // A full batch put back by an interrupted dispatch goes first
        if self.buffer.len() >= self.settings.batch_size {
            self.dispatch_unconditionally().await;
        }

        let mut drained = 0usize;
        while let Pop::Item(message) = self.reader.try_pop() {
            drained += 1;
            self.buffer.push(message.into_payload());
            if self.buffer.len() >= self.settings.batch_size {
                self.dispatch_unconditionally().await;
            }
        }
        if !self.buffer.is_empty() {
            self.dispatch_unconditionally().await;
        }

        // All permits back means every task of this group has finished
        match u32::try_from(self.settings.max_parallelism) {
            Ok(all) => {
                let _ = self.permits.acquire_many(all).await;
            }
            Err(_) => log::warn!(
                "Consumer group '{}' cannot wait for in-flight tasks: parallelism {} too large",
                self.settings.name,
                self.settings.max_parallelism
            ),
        }

        if drained > 0 {
            log::info!(
                "Consumer group '{}' drained {} item(s) on shutdown",
                self.settings.name,
                drained
            );
        }
    }

    async fn dispatch_unconditionally(&mut self) {
        let batch = self.take_buffer();
        match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => self.spawn_unit(batch, permit),
            Err(_) => log::warn!(
                "Consumer group '{}' lost {} item(s): dispatch gate closed",
                self.settings.name,
                batch.len()
            ),
        }
    }

    /// Shutdown without auto-drain: drop what is buffered
    fn discard(&mut self) {
        self.reader.close();
        let mut discarded = self.buffer.len();
        self.buffer.clear();
        while let Pop::Item(_) = self.reader.try_pop() {
            discarded += 1;
        }
        if discarded > 0 {
            log::debug!(
                "Consumer group '{}' discarded {} undelivered item(s)",
                self.settings.name,
                discarded
            );
        }
    }
}

async fn process_unit<T>(
    processor: &GroupProcessor<T>,
    batch: Vec<T>,
    delay_between_items: Duration,
    stats: &GroupStats,
    metrics: &QueueMetrics,
    handled: &mut u64,
) -> Result<(), HandlerError>
where
    T: Send + 'static,
{
    match processor {
        GroupProcessor::Batch(handler) => {
            let count = batch.len() as u64;
            handler.handle_batch(batch).await?;
            *handled = count;
            stats.record_processed(count);
            metrics.record_processed(count);
        }
        GroupProcessor::Item(handler) => {
            for item in batch {
                handler.handle(item).await?;
                *handled += 1;
                stats.record_processed(1);
                metrics.record_processed(1);
                // Also after the last item: the permit is held for the pause
                if !delay_between_items.is_zero() {
                    tokio::time::sleep(delay_between_items).await;
                }
            }
        }
    }
    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
