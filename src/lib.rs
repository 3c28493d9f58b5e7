//! jewel_customizer - State and asset orchestration for a rotating product customizer
//!
//! # Features
//! - Single source of truth for material, rotation and asset state
//! - Session asset cache with request coalescing and priority prefetch
//! - Frame-sequence viewer with format fallback, neighbour preloading and auto-rotate
//! - Device tiering and one-way render-mode fallback
//! - Async runtime abstraction (Tokio, mock)
//!
//! # Quick Start
//!
//! ```ignore
//! use jewel_customizer::{AssetCache, CustomizationController, MockAssetSource, TokioSpawner};
//!
//! let cache = AssetCache::new(MockAssetSource::default(), 4);
//! let controller = CustomizationController::builder("ring-001", cache, TokioSpawner::new())
//!     .initial_material("18k-rose-gold")
//!     .mount()?;
//! controller.initialize().await?;
//! controller.change_material("platinum").await?;
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-tokio`: Enable the Tokio spawner (default)

// Core modules
pub mod cache;
pub mod controller;
pub mod loader;
pub mod render;
pub mod runtime;
pub mod viewer;

// Support modules
pub mod catalog;
pub mod config;
pub mod device;
pub mod pricing;

// Error types
mod error;
pub use error::{CustomizerError, RenderError, Result};

// Re-export cache types
pub use cache::metrics::{AssetMetrics, AssetMetricsHandle};
pub use cache::{AssetCache, AssetKey, FetchGate, FetchPriority};

// Re-export loader types
pub use loader::{
    AssetBundle, AssetSource, HttpAssetSource, HttpResponse, HttpTransport, MockAssetSource,
};

// Re-export runtime types
pub use runtime::mock::MockSpawner;
#[cfg(feature = "runtime-tokio")]
pub use runtime::tokio_impl::TokioSpawner;
pub use runtime::{AsyncSpawner, TaskHandle};

// Re-export controller types
pub use controller::{
    CustomizationController, CustomizationOptions, CustomizerEvent, CustomizerObserver,
    CustomizerSnapshot, EventLog, RingSize, RotationState,
};

// Re-export viewer types
pub use viewer::format::FrameFormat;
pub use viewer::scheduler::RotationScheduler;
pub use viewer::{
    FrameImageLoader, FrameLoadState, FrameSequenceViewer, MockImageLoader, RotationSink,
    ViewerKey,
};

// Re-export render types
pub use render::{MockRenderer, ModelRenderer, RenderMode, RenderModeSwitcher};

// Re-export support types
pub use catalog::{MaterialCatalog, MaterialOption, PbrHints, PriceModifier, StoneQuality};
pub use config::{ConfigError, CustomizerConfig, FeatureFlags};
pub use device::{DeviceCapabilities, DeviceCapabilityProbe, DeviceEnvironment, DeviceTier};
pub use pricing::{CartSink, CatalogPricing, PriceCalculator, PriceQuote};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_catalog_available() {
        let catalog = MaterialCatalog::default();
        assert_eq!(catalog.default_material().id, "18k-rose-gold");
    }
}
