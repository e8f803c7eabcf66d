//! Bounded worker pool for blocking method bodies

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Method body panicked: {0}")]
    Panicked(String),

    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("Worker task was cancelled")]
    Cancelled,
}

/// Runs blocking bodies on tokio's blocking threads, never more than `size`
/// at once. Excess calls wait for a permit without blocking the event loop.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// One worker per available CPU
    pub fn default_size() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers currently idle
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run<F, T>(&self, work: F) -> Result<T, ExecutionError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ExecutionError::PoolClosed)?;
        debug!(
            "Worker acquired ({} of {} idle)",
            self.permits.available_permits(),
            self.size
        );

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        });

        handle.await.map_err(|err| {
            if err.is_panic() {
                ExecutionError::Panicked(panic_message(err.into_panic()))
            } else {
                ExecutionError::Cancelled
            }
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Self::default_size())
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
