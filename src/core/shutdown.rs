//! Shutdown coordination
//!
//! A `ShutdownCoordinator` owns the stop flag of one component: the whole
//! binary (wired to process signals) or a single queue engine. Background
//! loops hold a `ShutdownSignal` and poll or await it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Listener that also observes a shutdown triggered before it existed
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.shutdown_tx.subscribe(),
            requested: Arc::clone(&self.shutdown_requested),
        }
    }

    pub fn trigger_shutdown(&self) {
        // Release pairs with the Acquire loads in the listeners
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Run `future_fn` with SIGINT/SIGTERM/SIGHUP/SIGQUIT wired to shutdown
    ///
    /// The first signal requests shutdown; a second one exits the process.
    pub async fn guard_with_signals<F, Fut, R, E>(future_fn: F) -> Result<R, E>
    where
        F: FnOnce(ShutdownSignal) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let coordinator = Self::new();
        setup_signal_handlers(
            coordinator.shutdown_tx.clone(),
            Arc::clone(&coordinator.shutdown_requested),
        );
        future_fn(coordinator.signal()).await
    }
}

/// Listener side of a `ShutdownCoordinator`, owned by one background task
pub struct ShutdownSignal {
    receiver: broadcast::Receiver<()>,
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been requested
    ///
    /// A closed or lagged channel counts as shutdown.
    pub async fn cancelled(&mut self) {
        if self.is_requested() {
            return;
        }
        let _ = self.receiver.recv().await;
    }

    /// Sleep for `duration` unless shutdown arrives first
    ///
    /// Returns `true` when shutdown has been requested.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        let requested = Arc::clone(&self.requested);
        tokio::select! {
            _ = tokio::time::sleep(duration) => requested.load(Ordering::Acquire),
            _ = self.cancelled() => true,
        }
    }
}

fn setup_signal_handlers(shutdown_tx: broadcast::Sender<()>, shutdown_requested: Arc<AtomicBool>) {
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        use std::sync::atomic::AtomicUsize;
        use tokio::signal::unix::{signal, SignalKind};
        let received = Arc::new(AtomicUsize::new(0));

        for kind in [
            SignalKind::interrupt(),
            SignalKind::terminate(),
            SignalKind::hangup(),
            SignalKind::quit(),
        ] {
            let tx = shutdown_tx.clone();
            let requested = Arc::clone(&shutdown_requested);
            let received = Arc::clone(&received);

            tokio::spawn(async move {
                let Ok(mut stream) = signal(kind) else {
                    log::debug!("Cannot listen for {:?}", kind);
                    return;
                };
                while stream.recv().await.is_some() {
                    requested.store(true, Ordering::Release);
                    let _ = tx.send(());
                    if received.fetch_add(1, Ordering::AcqRel) >= 1 {
                        log::warn!("Second signal received; exiting without draining queues");
                        std::process::exit(130);
                    }
                    log::info!("Signal received; draining queues (repeat to force exit)");
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown_requested.store(true, Ordering::Release);
                let _ = shutdown_tx.send(());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_trigger_reaches_every_signal() {
        let coordinator = ShutdownCoordinator::new();
        let mut monitor = coordinator.signal();
        let mut drain_loop = coordinator.signal();
        assert!(!coordinator.is_shutdown_requested());

        coordinator.trigger_shutdown();

        assert!(coordinator.is_shutdown_requested());
        assert!(timeout(Duration::from_millis(100), monitor.cancelled()).await.is_ok());
        assert!(timeout(Duration::from_millis(100), drain_loop.cancelled()).await.is_ok());
    }

    #[tokio::test]
    async fn test_signal_created_after_trigger_resolves() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.trigger_shutdown();

        let mut signal = coordinator.signal();
        assert!(signal.is_requested());
        let cancelled = timeout(Duration::from_millis(100), signal.cancelled()).await;
        assert!(cancelled.is_ok(), "Late signal should see earlier shutdown");
    }

    #[tokio::test]
    async fn test_signal_interrupts_sleep() {
        let coordinator = ShutdownCoordinator::new();
        let mut signal = coordinator.signal();

        let sleeper = tokio::spawn(async move { signal.sleep(Duration::from_secs(30)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.trigger_shutdown();

        let interrupted = timeout(Duration::from_millis(500), sleeper)
            .await
            .expect("sleep should end on shutdown")
            .unwrap();
        assert!(interrupted);
    }

    #[tokio::test]
    async fn test_signal_sleep_completes_without_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let mut signal = coordinator.signal();

        assert!(!signal.sleep(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_guard_passes_a_live_signal() {
        let result = ShutdownCoordinator::guard_with_signals(|signal| async move {
            if signal.is_requested() {
                Err("already shut down")
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result, Ok(42));
    }
}
