//! Async runtime abstraction
//!
//! Background work (prefetching, neighbour preloads, the rotation scheduler)
//! is started through an [`AsyncSpawner`] so the customizer can run on Tokio
//! in production and on a deterministic mock in tests.

pub mod mock;
#[cfg(feature = "runtime-tokio")]
pub mod tokio_impl;

use std::fmt::Debug;
use std::future::Future;
use tokio::task::AbortHandle;

/// Handle to a spawned background task
///
/// Dropping the handle detaches the task; [`TaskHandle::abort`] stops it.
#[derive(Debug, Default)]
pub struct TaskHandle {
    abort: Option<AbortHandle>,
}

impl TaskHandle {
    /// Handle for work that already ran or was discarded
    pub fn detached() -> Self {
        Self { abort: None }
    }

    /// Wrap a Tokio abort handle
    pub fn from_abort(abort: AbortHandle) -> Self {
        Self { abort: Some(abort) }
    }

    /// Stop the task if it is still running
    pub fn abort(&self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// Whether the task has completed (detached handles always have)
    pub fn is_finished(&self) -> bool {
        self.abort.as_ref().map_or(true, AbortHandle::is_finished)
    }
}

/// Async task spawner trait
///
/// # Example
/// ```ignore
/// let spawner = TokioSpawner::new();
/// spawner.spawn(async {
///     cache.prefetch_materials("ring-001", ["platinum"], FetchPriority::High).await;
/// });
/// ```
pub trait AsyncSpawner: Send + Sync + Clone + Debug + 'static {
    /// Spawn a background task
    fn spawn<F>(&self, task: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static;

    /// Get the name of this runtime (for debugging)
    fn runtime_name(&self) -> &'static str;

    /// Block on a future (if supported by the runtime)
    ///
    /// Returns None if blocking is not supported.
    fn block_on<F, T>(&self, _future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        None
    }
}

// Re-export implementations
pub use mock::MockSpawner;

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::TokioSpawner;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_handle_is_finished() {
        let handle = TaskHandle::detached();
        assert!(handle.is_finished());
        handle.abort();
    }

    #[tokio::test]
    async fn test_abort_handle() {
        let task = tokio::spawn(std::future::pending::<()>());
        let handle = TaskHandle::from_abort(task.abort_handle());
        assert!(!handle.is_finished());

        handle.abort();
        assert!(task.await.unwrap_err().is_cancelled());
    }
}
