//! Traits for the queue system
//!
//! These are the seams between the engine and its collaborators: the
//! user-supplied processing capabilities, the metrics sink and the CPU time
//! source used by the load monitor.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Error type returned by processing handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one handler invocation
pub type HandlerResult = Result<(), HandlerError>;

/// Processes one item at a time
///
/// # Example Implementation
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use smartqueue::queue::{HandlerResult, ItemHandler};
///
/// struct AuditLog;
///
/// #[async_trait]
/// impl ItemHandler<String> for AuditLog {
///     async fn handle(&self, item: String) -> HandlerResult {
///         log::info!("audit: {}", item);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ItemHandler<T>: Send + Sync {
    async fn handle(&self, item: T) -> HandlerResult;
}

/// Processes a whole batch in one invocation
#[async_trait]
pub trait BatchHandler<T>: Send + Sync {
    async fn handle_batch(&self, batch: Vec<T>) -> HandlerResult;
}

/// Receives named counter increments from `QueueMetrics`
pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &str, by: u64);
}

/// Source of cumulative CPU time consumed by the current process
pub trait CpuClock: Send + Sync {
    /// Total CPU time (user + system) used so far, `None` if unavailable
    fn process_cpu_time(&self) -> Option<Duration>;

    /// Number of processors the CPU time is normalised against
    fn processor_count(&self) -> usize;
}

/// Adapter turning an async closure into an `ItemHandler`
pub struct ItemFn<F>(F);

/// Adapter turning an async closure into a `BatchHandler`
pub struct BatchFn<F>(F);

/// Wrap an async closure as an item handler
///
/// ```rust,no_run
/// use smartqueue::queue::item_fn;
///
/// let handler = item_fn(|user: String| async move {
///     log::info!("registered {}", user);
///     Ok(())
/// });
/// ```
pub fn item_fn<T, F, Fut>(f: F) -> ItemFn<F>
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    ItemFn(f)
}

/// Wrap an async closure as a batch handler
pub fn batch_fn<T, F, Fut>(f: F) -> BatchFn<F>
where
    F: Fn(Vec<T>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    BatchFn(f)
}

#[async_trait]
impl<T, F, Fut> ItemHandler<T> for ItemFn<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, item: T) -> HandlerResult {
        (self.0)(item).await
    }
}

#[async_trait]
impl<T, F, Fut> BatchHandler<T> for BatchFn<F>
where
    T: Send + 'static,
    F: Fn(Vec<T>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle_batch(&self, batch: Vec<T>) -> HandlerResult {
        (self.0)(batch).await
    }
}
