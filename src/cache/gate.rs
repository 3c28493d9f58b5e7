//! Priority admission for the shared asset transport
//!
//! A bounded number of fetches may run at once. While any high-priority
//! request is waiting, low-priority requests yield their turn.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

use crate::error::{CustomizerError, Result};

/// Scheduling class of an asset request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPriority {
    Low,
    High,
}

/// Held for the duration of one transport request
#[derive(Debug)]
pub struct FetchPermit {
    _permit: OwnedSemaphorePermit,
}

/// Bounded, two-class admission gate
#[derive(Debug)]
pub struct FetchGate {
    permits: Arc<Semaphore>,
    high_waiting: AtomicUsize,
    high_drained: Notify,
}

/// Counts a waiting high-priority request, including across cancellation
struct HighWaiter<'a>(&'a FetchGate);

impl<'a> HighWaiter<'a> {
    fn register(gate: &'a FetchGate) -> Self {
        gate.high_waiting.fetch_add(1, Ordering::SeqCst);
        Self(gate)
    }
}

impl Drop for HighWaiter<'_> {
    fn drop(&mut self) {
        if self.0.high_waiting.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.high_drained.notify_waiters();
        }
    }
}

impl FetchGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            high_waiting: AtomicUsize::new(0),
            high_drained: Notify::new(),
        }
    }

    /// Wait for a transport slot
    pub async fn acquire(&self, priority: FetchPriority) -> Result<FetchPermit> {
        match priority {
            FetchPriority::High => {
                let _waiting = HighWaiter::register(self);
                let permit = self.acquire_slot().await?;
                Ok(FetchPermit { _permit: permit })
            }
            FetchPriority::Low => loop {
                let drained = self.high_drained.notified();
                tokio::pin!(drained);
                drained.as_mut().enable();

                if self.high_waiting.load(Ordering::SeqCst) > 0 {
                    drained.await;
                    continue;
                }

                let permit = self.acquire_slot().await?;
                if self.high_waiting.load(Ordering::SeqCst) == 0 {
                    return Ok(FetchPermit { _permit: permit });
                }
                // A high-priority request queued while we waited; hand the slot over.
                drop(permit);
            },
        }
    }

    /// Slots not currently held
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| CustomizerError::Cancelled)
    }
}
