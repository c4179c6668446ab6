//! Shared helpers for the integration tests

use smartqueue::queue::api::{
    item_fn, CpuClock, EngineOptions, ItemHandler, MetricsSink, SmartQueueEngine,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// CPU clock with no readings; the throttle never engages
pub struct NoCpuReadings;

impl CpuClock for NoCpuReadings {
    fn process_cpu_time(&self) -> Option<Duration> {
        None
    }

    fn processor_count(&self) -> usize {
        1
    }
}

pub fn engine<T>(options: EngineOptions) -> SmartQueueEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    SmartQueueEngine::with_cpu_clock(
        EngineOptions {
            idle_poll_ms: 1,
            ..options
        },
        Arc::new(NoCpuReadings),
    )
    .unwrap()
}

/// Item handler appending everything it sees to `seen`
pub fn collecting<T>(seen: Arc<Mutex<Vec<T>>>) -> impl ItemHandler<T>
where
    T: Send + 'static,
{
    item_fn(move |item: T| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().unwrap().push(item);
            Ok(())
        }
    })
}

/// Sink accumulating counter increments by name
#[derive(Default)]
pub struct CountingSink {
    counters: Mutex<HashMap<String, u64>>,
}

impl CountingSink {
    pub fn get(&self, name: &str) -> u64 {
        self.counters.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl MetricsSink for CountingSink {
    fn increment(&self, name: &str, by: u64) {
        *self
            .counters
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_insert(0) += by;
    }
}
