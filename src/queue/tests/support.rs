//! Shared fixtures for queue tests

use crate::queue::api::{
    batch_fn, item_fn, BatchHandler, CpuClock, EngineOptions, ItemHandler, SmartQueueEngine,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Clock that never yields a reading, so the throttle stays released
pub struct SilentClock;

impl CpuClock for SilentClock {
    fn process_cpu_time(&self) -> Option<Duration> {
        None
    }

    fn processor_count(&self) -> usize {
        1
    }
}

/// Clock reporting twice the elapsed wall time on a single processor
pub struct BusyClock {
    started: Instant,
}

impl BusyClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl CpuClock for BusyClock {
    fn process_cpu_time(&self) -> Option<Duration> {
        Some(self.started.elapsed() * 2)
    }

    fn processor_count(&self) -> usize {
        1
    }
}

/// Options with a fast idle poll, suited to short tests
pub fn test_options() -> EngineOptions {
    EngineOptions {
        idle_poll_ms: 1,
        ..EngineOptions::default()
    }
}

/// Engine whose CPU monitor never engages the throttle
pub fn quiet_engine<T>(options: EngineOptions) -> SmartQueueEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    SmartQueueEngine::with_cpu_clock(options, Arc::new(SilentClock)).unwrap()
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "Timed out waiting for {what}");
}

/// Records every item or batch it is handed
pub struct Recorder<T> {
    pub items: Arc<Mutex<Vec<T>>>,
    pub batches: Arc<Mutex<Vec<Vec<T>>>>,
}

impl<T> Recorder<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn items(&self) -> Vec<T> {
        self.items.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn batches(&self) -> Vec<Vec<T>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn item_handler(&self) -> impl ItemHandler<T> {
        let items = Arc::clone(&self.items);
        item_fn(move |item: T| {
            let items = Arc::clone(&items);
            async move {
                items.lock().unwrap().push(item);
                Ok(())
            }
        })
    }

    /// Item handler that waits for a permit on `gate` before recording
    pub fn gated_item_handler(&self, gate: Arc<Semaphore>) -> impl ItemHandler<T> {
        let items = Arc::clone(&self.items);
        item_fn(move |item: T| {
            let items = Arc::clone(&items);
            let gate = Arc::clone(&gate);
            async move {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
                items.lock().unwrap().push(item);
                Ok(())
            }
        })
    }

    /// Batch handler; individual items are recorded too
    pub fn batch_handler(&self) -> impl BatchHandler<T> {
        let items = Arc::clone(&self.items);
        let batches = Arc::clone(&self.batches);
        batch_fn(move |batch: Vec<T>| {
            let items = Arc::clone(&items);
            let batches = Arc::clone(&batches);
            async move {
                items.lock().unwrap().extend(batch.iter().cloned());
                batches.lock().unwrap().push(batch);
                Ok(())
            }
        })
    }
}

/// Tracks how many handler invocations overlap
#[derive(Clone, Default)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn enter_for(&self, busy: Duration) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(busy).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}
