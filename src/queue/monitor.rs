//! CPU load monitor and the throttle flag it drives
//!
//! The monitor samples the CPU time consumed by this process on a fixed
//! interval and engages the throttle while usage sits at or above the
//! configured threshold. Publishers read the flag without blocking.

use crate::core::shutdown::ShutdownSignal;
use crate::queue::traits::CpuClock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Process-wide throttle flag
///
/// Written only by the `CpuLoadMonitor`, read by every publish call.
#[derive(Debug, Clone, Default)]
pub struct ThrottleState {
    engaged: Arc<AtomicBool>,
}

impl ThrottleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// Store a new value and return the previous one
    pub(crate) fn set(&self, engaged: bool) -> bool {
        self.engaged.swap(engaged, Ordering::AcqRel)
    }
}

/// CPU time of the running process, read through `getrusage`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessCpuClock;

impl CpuClock for ProcessCpuClock {
    #[cfg(unix)]
    fn process_cpu_time(&self) -> Option<Duration> {
        let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
        // SAFETY: getrusage only writes into the provided, properly sized struct
        let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
        if rc != 0 {
            return None;
        }
        // SAFETY: rc == 0 means the kernel filled the struct
        let usage = unsafe { usage.assume_init() };
        Some(timeval_to_duration(usage.ru_utime) + timeval_to_duration(usage.ru_stime))
    }

    #[cfg(not(unix))]
    fn process_cpu_time(&self) -> Option<Duration> {
        None
    }

    fn processor_count(&self) -> usize {
        num_cpus::get()
    }
}

#[cfg(unix)]
fn timeval_to_duration(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec.max(0) as u64) + Duration::from_micros(tv.tv_usec.max(0) as u64)
}

/// Percentage of available CPU capacity used over one sampling window
///
/// Returns `None` for an empty window.
pub fn cpu_usage_percent(cpu_delta: Duration, wall_delta: Duration, processors: usize) -> Option<f64> {
    let capacity = wall_delta.as_secs_f64() * processors.max(1) as f64;
    if capacity <= 0.0 {
        return None;
    }
    Some(cpu_delta.as_secs_f64() / capacity * 100.0)
}

/// Periodic sampler that drives a `ThrottleState`
pub struct CpuLoadMonitor {
    clock: Arc<dyn CpuClock>,
    threshold: u8,
    interval: Duration,
    throttle: ThrottleState,
    baseline: Option<(Duration, Instant)>,
}

impl CpuLoadMonitor {
    pub fn new(
        clock: Arc<dyn CpuClock>,
        threshold: u8,
        interval: Duration,
        throttle: ThrottleState,
    ) -> Self {
        Self {
            clock,
            threshold,
            interval,
            throttle,
            baseline: None,
        }
    }

    pub fn throttle(&self) -> &ThrottleState {
        &self.throttle
    }

    /// Take one sample at `now` and update the throttle flag
    ///
    /// The first successful read only records the baseline and returns `None`.
    /// An unreadable clock leaves both the baseline and the flag untouched.
    pub fn sample(&mut self, now: Instant) -> Option<f64> {
        let cpu_time = self.clock.process_cpu_time()?;
        let previous = self.baseline.replace((cpu_time, now));
        let (last_cpu, last_wall) = previous?;

        let usage = cpu_usage_percent(
            cpu_time.saturating_sub(last_cpu),
            now.saturating_duration_since(last_wall),
            self.clock.processor_count(),
        )?;

        let engage = usage >= f64::from(self.threshold);
        let was_engaged = self.throttle.set(engage);
        log::debug!("CPU usage: {:.2}% (throttle: {})", usage, engage);
        match (was_engaged, engage) {
            (false, true) => log::info!(
                "CPU throttle engaged: {:.2}% >= {}%, new items will be discarded",
                usage,
                self.threshold
            ),
            (true, false) => log::info!(
                "CPU throttle released: {:.2}% < {}%",
                usage,
                self.threshold
            ),
            _ => {}
        }

        Some(usage)
    }

    pub(crate) fn spawn(self, runtime: &Handle, shutdown: ShutdownSignal) -> JoinHandle<()> {
        runtime.spawn(self.run(shutdown))
    }

    async fn run(mut self, mut shutdown: ShutdownSignal) {
        log::debug!(
            "CPU monitor started (threshold: {}%, interval: {:?})",
            self.threshold,
            self.interval
        );
        loop {
            if shutdown.sleep(self.interval).await {
                break;
            }
            self.sample(Instant::now());
        }
        log::debug!("CPU monitor stopped");
    }
}
