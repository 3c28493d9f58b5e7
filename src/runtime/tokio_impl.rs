//! Tokio async runtime implementation

use super::{AsyncSpawner, TaskHandle};
use std::future::Future;
use tokio::runtime::Handle;

/// Tokio-based async spawner
///
/// Spawns onto an explicit runtime handle when one was given, otherwise onto
/// the runtime of the calling context.
#[derive(Clone, Debug, Default)]
pub struct TokioSpawner {
    handle: Option<Handle>,
}

impl TokioSpawner {
    /// Spawner for the ambient runtime
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Spawner bound to a specific runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl AsyncSpawner for TokioSpawner {
    fn spawn<F>(&self, task: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let join = match &self.handle {
            Some(handle) => handle.spawn(task),
            None => tokio::spawn(task),
        };
        TaskHandle::from_abort(join.abort_handle())
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }

    fn block_on<F, T>(&self, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        if let Ok(handle) = Handle::try_current() {
            // block_in_place panics on a current-thread runtime
            if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::CurrentThread {
                return None;
            }
            Some(tokio::task::block_in_place(|| handle.block_on(future)))
        } else {
            let rt = tokio::runtime::Runtime::new().ok()?;
            Some(rt.block_on(future))
        }
    }
}
