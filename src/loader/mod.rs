//! Asset sources
//!
//! An [`AssetSource`] resolves the frame-sequence asset paths for one
//! `(product, material)` pair. The HTTP source talks to the storefront's asset
//! endpoint; the mock source is used in tests and demos.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use http::{HttpAssetSource, HttpResponse, HttpTransport};
pub use mock::MockAssetSource;

/// Resolved frame-sequence assets for one material of one product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBundle {
    pub product_id: String,
    pub material_id: String,
    /// Per-frame base paths, in frame order
    pub asset_paths: Vec<String>,
    pub frame_count: usize,
    pub available: bool,
    pub last_generated: Option<String>,
}

impl AssetBundle {
    /// Base path for a frame, falling back to the first path when the bundle
    /// holds a single directory for the whole sequence
    pub fn path_for_frame(&self, frame: usize) -> Option<&str> {
        self.asset_paths
            .get(frame)
            .or_else(|| self.asset_paths.first())
            .map(String::as_str)
    }
}

/// Something that can resolve asset bundles
///
/// Uses async-trait for dyn compatibility
#[async_trait]
pub trait AssetSource: Send + Sync + 'static {
    /// Fetch the bundle for a material; never consults any cache
    async fn fetch_assets(&self, product_id: &str, material_id: &str) -> Result<AssetBundle>;
}
