//! Background task registry
//!
//! Tracks spawned tasks and supports cooperative shutdown.
//!
//! Join handles sit behind a `parking_lot::Mutex`; it is never held across
//! an `.await`.

use futures::future::join_all;
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Owner of the repository's background tasks
#[derive(Debug)]
pub struct TaskRegistry {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
    /// Empty registry
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Number of tasks spawned and not yet reaped
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Whether no task is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether shutdown has been requested
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Run `fut` until it completes or shutdown is requested
    pub fn spawn_cancellable<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = fut => {}
            }
        });
        self.handles.lock().push(handle);
    }

    /// Call `f` every `interval` until it returns `false` or shutdown is requested
    ///
    /// A tick that is already running completes before the task observes shutdown.
    pub fn spawn_interval_until<F, Fut>(&self, interval: Duration, mut f: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        if !f().await {
                            break;
                        }
                    }
                }
            }
        });
        self.handles.lock().push(handle);
    }

    /// Signal shutdown and wait for every task to stop
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for result in join_all(handles).await {
            if let Err(err) = result {
                if err.is_panic() {
                    tracing::error!(error = %err, "background task panicked");
                }
            }
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_interval_runs_until_shutdown() {
        let registry = TaskRegistry::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        registry.spawn_interval_until(Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        tokio::time::sleep(Duration::from_millis(40)).await;
        registry.shutdown().await;
        let stopped_at = ticks.load(Ordering::SeqCst);
        assert!(stopped_at >= 2);
        assert!(registry.is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), stopped_at);
    }

    #[tokio::test]
    async fn test_interval_stops_when_callback_declines() {
        let registry = TaskRegistry::new();
        registry.spawn_interval_until(Duration::from_millis(1), || async { false });
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.shutdown().await;
        assert!(registry.is_shutting_down());
    }

    #[tokio::test]
    async fn test_cancellable_task_is_stopped() {
        let registry = TaskRegistry::new();
        registry.spawn_cancellable(std::future::pending());
        assert_eq!(registry.len(), 1);
        registry.shutdown().await;
        assert!(registry.is_empty());
    }
}
