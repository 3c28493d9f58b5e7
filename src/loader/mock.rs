//! Mock asset source for testing
//!
//! Serves generated bundles from memory and records every request, with
//! per-material latency and failure injection.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{AssetBundle, AssetSource};
use crate::error::{CustomizerError, Result};

/// Injected behaviour for one material
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Answer with a generated bundle
    Serve,
    /// Fail as a transport error
    NetworkFailure,
    /// Answer, but with no usable assets
    Unavailable,
}

#[derive(Debug, Default)]
struct MockState {
    behaviors: HashMap<String, MockBehavior>,
    delays: HashMap<String, Duration>,
    requests: Vec<(String, String)>,
}

/// In-memory [`AssetSource`]
#[derive(Clone, Debug)]
pub struct MockAssetSource {
    frame_count: usize,
    default_delay: Duration,
    state: Arc<RwLock<MockState>>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockAssetSource {
    fn default() -> Self {
        Self::new(36)
    }
}

impl MockAssetSource {
    /// Create a mock source that serves `frame_count`-frame sequences
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame_count,
            default_delay: Duration::ZERO,
            state: Arc::new(RwLock::new(MockState::default())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Latency applied to every material without its own delay
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn set_behavior(&self, material_id: &str, behavior: MockBehavior) {
        self.state
            .write()
            .behaviors
            .insert(material_id.to_string(), behavior);
    }

    pub fn set_delay(&self, material_id: &str, delay: Duration) {
        self.state
            .write()
            .delays
            .insert(material_id.to_string(), delay);
    }

    /// Total number of fetches served or failed
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of fetches for one material
    pub fn calls_for(&self, material_id: &str) -> usize {
        self.state
            .read()
            .requests
            .iter()
            .filter(|(_, m)| m == material_id)
            .count()
    }

    /// Every `(product, material)` requested, in order
    pub fn requests(&self) -> Vec<(String, String)> {
        self.state.read().requests.clone()
    }

    /// The bundle this source serves for a material
    pub fn bundle_for(&self, product_id: &str, material_id: &str) -> AssetBundle {
        AssetBundle {
            product_id: product_id.to_string(),
            material_id: material_id.to_string(),
            asset_paths: vec![format!("/sequences/{product_id}/{material_id}")],
            frame_count: self.frame_count,
            available: true,
            last_generated: Some("2024-01-01T00:00:00Z".to_string()),
        }
    }
}

#[async_trait]
impl AssetSource for MockAssetSource {
    async fn fetch_assets(&self, product_id: &str, material_id: &str) -> Result<AssetBundle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (behavior, delay) = {
            let mut state = self.state.write();
            state
                .requests
                .push((product_id.to_string(), material_id.to_string()));
            (
                state
                    .behaviors
                    .get(material_id)
                    .cloned()
                    .unwrap_or(MockBehavior::Serve),
                state
                    .delays
                    .get(material_id)
                    .copied()
                    .unwrap_or(self.default_delay),
            )
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match behavior {
            MockBehavior::Serve => Ok(self.bundle_for(product_id, material_id)),
            MockBehavior::NetworkFailure => Err(CustomizerError::Network(format!(
                "mock transport refused {material_id}"
            ))),
            MockBehavior::Unavailable => Err(CustomizerError::AssetsUnavailable {
                material_id: material_id.to_string(),
                message: "assets not generated for this material".to_string(),
            }),
        }
    }
}
