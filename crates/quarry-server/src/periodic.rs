//! User-defined periodic tasks
//!
//! A [`PeriodicTask`] runs every `interval` for as long as the service is
//! serving. The first run happens one interval after start-up. Blocking
//! bodies go through the service's [`WorkerPool`]; suspending bodies are
//! awaited on the event loop. A run that panics is logged and the task keeps
//! its schedule.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::executor::{WorkerPool, panic_message};

pub type BlockingTaskFn = dyn Fn() + Send + Sync;
pub type SuspendingTaskFn = dyn Fn() -> BoxFuture<'static, ()> + Send + Sync;

#[derive(Clone)]
pub enum TaskBody {
    Blocking(Arc<BlockingTaskFn>),
    Suspending(Arc<SuspendingTaskFn>),
}

/// A callable run on a fixed interval while the service is up
#[derive(Clone)]
pub struct PeriodicTask {
    name: String,
    interval: Duration,
    body: TaskBody,
}

impl PeriodicTask {
    pub fn blocking<F>(name: impl Into<String>, interval: Duration, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            interval,
            body: TaskBody::Blocking(Arc::new(f)),
        }
    }

    pub fn suspending<F, Fut>(name: impl Into<String>, interval: Duration, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            interval,
            body: TaskBody::Suspending(Arc::new(move || f().boxed())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn body(&self) -> &TaskBody {
        &self.body
    }

    async fn run_once(&self, pool: &WorkerPool) {
        let outcome = match &self.body {
            TaskBody::Blocking(body) => {
                let body = Arc::clone(body);
                pool.run(move || body()).await.map_err(|err| err.to_string())
            }
            TaskBody::Suspending(body) => AssertUnwindSafe(body())
                .catch_unwind()
                .await
                .map_err(panic_message),
        };
        if let Err(err) = outcome {
            warn!(task = %self.name, "Periodic task run failed: {}", err);
        }
    }
}

impl fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            TaskBody::Blocking(_) => "blocking",
            TaskBody::Suspending(_) => "suspending",
        };
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("body", &kind)
            .finish()
    }
}

/// Running periodic tasks, stopped together
pub struct PeriodicScheduler {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl PeriodicScheduler {
    /// Spawn one loop per task on the current runtime
    pub fn start(tasks: &[PeriodicTask], pool: &WorkerPool) -> Self {
        let cancel = CancellationToken::new();
        let handles = tasks
            .iter()
            .map(|task| {
                debug!(task = %task.name, interval = ?task.interval, "Starting periodic task");
                tokio::spawn(run_periodic_loop(task.clone(), pool.clone(), cancel.clone()))
            })
            .collect();
        Self { cancel, handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop scheduling new runs and wait for the loops to exit. A blocking
    /// run already on the pool is left to finish on its own.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!("Periodic task loop ended abnormally: {}", err);
            }
        }
    }
}

async fn run_periodic_loop(task: PeriodicTask, pool: WorkerPool, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + task.interval, task.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(task = %task.name, "Periodic task stopped");
                break;
            }
            _ = ticker.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = task.run_once(&pool) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(interval: Duration) -> (PeriodicTask, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task = PeriodicTask::suspending("count", interval, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, runs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_once_per_interval() {
        let (task, runs) = counting(Duration::from_millis(100));
        let scheduler = PeriodicScheduler::start(&[task], &WorkerPool::new(1));
        assert_eq!(scheduler.len(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_schedule() {
        let (task, runs) = counting(Duration::from_millis(100));
        let scheduler = PeriodicScheduler::start(&[task], &WorkerPool::new(1));

        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.shutdown().await;
        let seen = runs.load(Ordering::SeqCst);
        assert_eq!(seen, 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_run_keeps_schedule() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task = PeriodicTask::suspending("flaky", Duration::from_millis(100), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run fails");
                }
            }
        });
        let scheduler = PeriodicScheduler::start(&[task], &WorkerPool::new(1));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_blocking_task_uses_the_pool() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let task = PeriodicTask::blocking("tick", Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(matches!(task.body(), TaskBody::Blocking(_)));

        let scheduler = PeriodicScheduler::start(&[task], &WorkerPool::new(1));
        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.shutdown().await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }
}
