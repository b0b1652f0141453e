//! Fixed-period polling with an explicit start/stop contract
//!
//! The task runs once immediately on start, then on every period tick, until
//! `stop` is called. No framework lifecycle hooks are involved.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a running polling loop
pub struct Poller {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl Poller {
    /// Spawn the loop. The first run happens immediately.
    pub fn start<F, Fut>(period: Duration, mut task: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => task().await,
                    _ = shutdown_rx.changed() => {
                        debug!("Poller stopping");
                        break;
                    }
                }
            }
        });

        Self { handle, shutdown }
    }

    /// Signal the loop to stop and wait for it to finish. An in-flight task
    /// run completes before the loop exits.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_immediately_and_periodically() {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();

        let poller = Poller::start(Duration::from_millis(10), move || {
            let task_count = task_count.clone();
            async move {
                task_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        poller.stop().await;

        // Immediate first run plus at least a few ticks
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_stop_halts_the_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();

        let poller = Poller::start(Duration::from_millis(5), move || {
            let task_count = task_count.clone();
            async move {
                task_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        poller.stop().await;

        let after_stop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }
}
