//! Queue counters
//!
//! `QueueMetrics` holds the engine-wide accepted/processed counters and
//! `GroupStats` the per-group view. Both are observability only: nothing in
//! the engine reads them to make decisions.

use crate::queue::traits::MetricsSink;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counter name mirrored to the sink for every accepted publish
pub const ENQUEUED_COUNTER: &str = "queue.enqueued";
/// Counter name mirrored to the sink for every successfully processed item
pub const PROCESSED_COUNTER: &str = "queue.processed";

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Publish calls that reached the fan-out stage
    pub accepted: u64,
    /// Items successfully handled, summed over all groups
    pub processed: u64,
}

/// Monotonic engine counters, optionally mirrored to a `MetricsSink`
#[derive(Default)]
pub struct QueueMetrics {
    accepted: AtomicU64,
    processed: AtomicU64,
    sink: Option<Arc<dyn MetricsSink>>,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::default()
        }
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: self.accepted(),
            processed: self.processed(),
        }
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        if let Some(sink) = &self.sink {
            sink.increment(ENQUEUED_COUNTER, 1);
        }
    }

    pub(crate) fn record_processed(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.processed.fetch_add(count, Ordering::Relaxed);
        if let Some(sink) = &self.sink {
            sink.increment(PROCESSED_COUNTER, count);
        }
    }
}

impl std::fmt::Debug for QueueMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueMetrics")
            .field("accepted", &self.accepted())
            .field("processed", &self.processed())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// Per-group statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupStatsSnapshot {
    /// Items waiting in the group's channel
    pub queued: usize,
    pub processed: u64,
    pub failed: u64,
    pub dropped: u64,
    pub in_flight: usize,
}

/// Live counters for one consumer group
#[derive(Debug, Default)]
pub struct GroupStats {
    processed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    in_flight: AtomicUsize,
}

impl GroupStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> GroupStatsSnapshot {
        GroupStatsSnapshot {
            queued: 0,
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_processed(&self, count: u64) {
        self.processed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self, count: u64) {
        self.failed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_finished(&self) {
        self.in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(1))
            })
            .ok();
    }
}
