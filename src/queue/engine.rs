//! SmartQueue engine
//!
//! The engine owns everything belonging to one queue: the registration
//! table, the per-group drain loops, the CPU monitor and the shutdown
//! coordinator that stops them.

use crate::core::shutdown::ShutdownCoordinator;
use crate::core::sync::handle_mutex_poison;
use crate::queue::channel::ConsumerChannel;
use crate::queue::consumer::ConsumerGroupConfig;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::metrics::{GroupStats, GroupStatsSnapshot, QueueMetrics};
use crate::queue::monitor::{CpuLoadMonitor, ProcessCpuClock, ThrottleState};
use crate::queue::options::EngineOptions;
use crate::queue::processor::{ConsumerGroupProcessor, DrainPolicy, ProcessorState};
use crate::queue::publisher::{FanoutPublisher, PublishOutcome, Registration};
use crate::queue::traits::{CpuClock, MetricsSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// In-process fan-out queue for items of type `T`
///
/// Every item published is copied to each consumer group registered at that
/// moment. Groups process their copies independently, bounded by their own
/// parallelism, while a CPU monitor discards new items under heavy load.
///
/// # Example
///
/// ```rust,no_run
/// use smartqueue::queue::{item_fn, ConsumerGroupConfig, EngineOptions, SmartQueueEngine};
///
/// # async fn example() -> Result<(), smartqueue::queue::QueueError> {
/// let engine = SmartQueueEngine::<String>::new(EngineOptions::default())?;
/// engine.register_consumer_group(
///     ConsumerGroupConfig::new("welcome-mail").with_item_handler(item_fn(|email: String| async move {
///         log::info!("sending welcome mail to {}", email);
///         Ok(())
///     })),
/// )?;
///
/// engine.publish("ada@example.com".to_string()).await?;
/// engine.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct SmartQueueEngine<T> {
    options: EngineOptions,
    publisher: FanoutPublisher<T>,
    metrics: Arc<QueueMetrics>,
    throttle: ThrottleState,
    shutdown: ShutdownCoordinator,
    runtime: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl<T> SmartQueueEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an engine and start its CPU monitor
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(options: EngineOptions) -> QueueResult<Self> {
        Self::build(options, QueueMetrics::new(), Arc::new(ProcessCpuClock))
    }

    /// Create an engine whose counters are mirrored to `sink`
    pub fn with_metrics_sink(options: EngineOptions, sink: Arc<dyn MetricsSink>) -> QueueResult<Self> {
        Self::build(options, QueueMetrics::with_sink(sink), Arc::new(ProcessCpuClock))
    }

    /// Create an engine sampling CPU time from a custom clock
    pub fn with_cpu_clock(options: EngineOptions, clock: Arc<dyn CpuClock>) -> QueueResult<Self> {
        Self::build(options, QueueMetrics::new(), clock)
    }

    fn build(options: EngineOptions, metrics: QueueMetrics, clock: Arc<dyn CpuClock>) -> QueueResult<Self> {
        options.validate()?;
        let runtime = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;

        let shutdown = ShutdownCoordinator::new();
        let metrics = Arc::new(metrics);
        let throttle = ThrottleState::new();

        let monitor = CpuLoadMonitor::new(
            clock,
            options.cpu_threshold,
            options.cpu_check_interval(),
            throttle.clone(),
        );
        let monitor_task = monitor.spawn(&runtime, shutdown.signal());

        log::debug!(
            "SmartQueue created (max queue size: {}, cpu threshold: {}%, drop on full: {}, auto drain: {})",
            options.max_queue_size,
            options.cpu_threshold,
            options.drop_on_full_queue,
            options.auto_drain_on_shutdown
        );

        Ok(Self {
            publisher: FanoutPublisher::new(
                throttle.clone(),
                Arc::clone(&metrics),
                options.drop_on_full_queue,
            ),
            options,
            metrics,
            throttle,
            shutdown,
            runtime,
            tasks: Mutex::new(vec![monitor_task]),
            stopped: AtomicBool::new(false),
        })
    }

    /// Register a consumer group and start its drain loop
    ///
    /// The group only sees items published after this call returns.
    pub fn register_consumer_group(&self, config: ConsumerGroupConfig<T>) -> QueueResult<()> {
        let group = config.resolve()?;

        self.publisher.with_table(|table| {
            if self.is_stopped() {
                return Err(QueueError::Stopped);
            }
            if table.iter().any(|existing| existing.name == group.settings.name) {
                return Err(QueueError::configuration(format!(
                    "consumer group '{}' is already registered",
                    group.settings.name
                )));
            }

            let name = group.settings.name.clone();
            let (channel, reader) = ConsumerChannel::bounded(self.options.max_queue_size);
            let stats = Arc::new(GroupStats::new());
            let processor = ConsumerGroupProcessor::new(
                group.settings,
                group.processor,
                reader,
                Arc::clone(&stats),
                Arc::clone(&self.metrics),
                DrainPolicy {
                    idle_poll: self.options.idle_poll(),
                    auto_drain: self.options.auto_drain_on_shutdown,
                },
            );
            let state = processor.state();

            let mut tasks = handle_mutex_poison(self.tasks.lock(), QueueError::synchronisation)?;
            tasks.push(self.runtime.spawn(processor.run(self.shutdown.signal())));
            table.push(Arc::new(Registration {
                name: name.clone(),
                channel,
                stats,
                state,
            }));

            log::info!("Consumer group '{}' registered", name);
            Ok(())
        })
    }

    /// Offer `item` to every registered consumer group
    ///
    /// Waits while a group's channel is full unless drop-on-full is enabled.
    /// Returns `Discarded` without touching any channel while the CPU
    /// throttle is engaged.
    pub async fn publish(&self, item: T) -> QueueResult<PublishOutcome> {
        if self.is_stopped() {
            return Err(QueueError::Stopped);
        }
        self.publisher.publish(item).await
    }

    /// Stop the monitor and every drain loop
    ///
    /// With auto-drain enabled this returns once every group has processed
    /// what was buffered. Calling it again is a no-op.
    pub async fn stop(&self) {
        // Taking the table lock orders stop against concurrent registrations
        let first = self
            .publisher
            .with_table(|_| Ok(!self.stopped.swap(true, Ordering::AcqRel)))
            .unwrap_or_else(|error| {
                log::warn!("Stopping SmartQueue without registration lock: {}", error);
                !self.stopped.swap(true, Ordering::AcqRel)
            });
        if !first {
            return;
        }

        log::info!("Stopping SmartQueue with {} consumer group(s)", self.group_count());
        self.shutdown.trigger_shutdown();

        let tasks = match handle_mutex_poison(self.tasks.lock(), QueueError::synchronisation) {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(error) => {
                log::error!("Cannot join queue tasks: {}", error);
                return;
            }
        };

        for result in futures::future::join_all(tasks).await {
            if let Err(error) = result {
                log::error!("Queue task ended abnormally: {}", error);
            }
        }
        log::info!("SmartQueue stopped");
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    pub fn is_throttled(&self) -> bool {
        self.throttle.is_engaged()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Registered group names, in registration order
    pub fn group_names(&self) -> Vec<String> {
        self.registrations()
            .iter()
            .map(|registration| registration.name.clone())
            .collect()
    }

    pub fn group_count(&self) -> usize {
        self.registrations().len()
    }

    pub fn group_stats(&self, name: &str) -> Option<GroupStatsSnapshot> {
        self.find(name).map(|registration| registration.snapshot())
    }

    pub fn group_state(&self, name: &str) -> Option<ProcessorState> {
        self.find(name).map(|registration| registration.state())
    }

    #[cfg(test)]
    pub(crate) fn throttle_state(&self) -> &ThrottleState {
        &self.throttle
    }

    fn find(&self, name: &str) -> Option<Arc<Registration<T>>> {
        self.registrations()
            .into_iter()
            .find(|registration| registration.name == name)
    }

    fn registrations(&self) -> Vec<Arc<Registration<T>>> {
        self.publisher.targets().unwrap_or_else(|error| {
            log::warn!("Registration table unavailable: {}", error);
            Vec::new()
        })
    }
}

impl<T> Drop for SmartQueueEngine<T> {
    fn drop(&mut self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            log::debug!("SmartQueue dropped without stop, cancelling background tasks");
            self.shutdown.trigger_shutdown();
        }
    }
}
