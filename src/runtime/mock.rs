//! Mock async spawner for testing
//!
//! Provides a spawner that either runs background work to completion on the
//! calling thread or discards it, making prefetch and preload effects
//! observable without a scheduler.

use super::{AsyncSpawner, TaskHandle};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Spawn behavior for MockSpawner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSpawnBehavior {
    /// Drop tasks immediately (don't execute)
    Drop,
    /// Run tasks to completion before `spawn` returns
    ///
    /// Uses a bare executor with no Tokio timer driver, so tasks must not
    /// await `tokio::time` (a delayed `MockAssetSource` would never wake).
    BlockSync,
}

/// Mock async spawner for testing
#[derive(Clone, Debug)]
pub struct MockSpawner {
    behavior: MockSpawnBehavior,
    spawned: Arc<AtomicUsize>,
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// Create a new mock spawner that drops tasks
    pub fn new() -> Self {
        Self::with_behavior(MockSpawnBehavior::Drop)
    }

    /// Create a mock spawner with specific behavior
    pub fn with_behavior(behavior: MockSpawnBehavior) -> Self {
        Self {
            behavior,
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock spawner that runs tasks synchronously
    ///
    /// Only for work that never sleeps on a Tokio timer. Inside a
    /// current-thread runtime such a task blocks the only worker and the
    /// test hangs; use [`TokioSpawner`](crate::TokioSpawner) with paused time
    /// for delayed sources instead.
    pub fn blocking() -> Self {
        Self::with_behavior(MockSpawnBehavior::BlockSync)
    }

    /// Number of tasks handed to this spawner (shared between clones)
    pub fn spawned_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl AsyncSpawner for MockSpawner {
    fn spawn<F>(&self, task: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockSpawnBehavior::Drop => drop(task),
            MockSpawnBehavior::BlockSync => futures::executor::block_on(task),
        }
        TaskHandle::detached()
    }

    fn runtime_name(&self) -> &'static str {
        "Mock"
    }

    fn block_on<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        match self.behavior {
            MockSpawnBehavior::Drop => None,
            MockSpawnBehavior::BlockSync => Some(futures::executor::block_on(future)),
        }
    }
}
