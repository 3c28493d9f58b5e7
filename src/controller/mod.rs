//! Customization state controller
//!
//! The controller is the single owner of [`CustomizerSnapshot`]. Material
//! changes go through the shared [`AssetCache`]; the latest request always
//! wins, a failed switch keeps the previous assets on screen, and the price is
//! recomputed and announced before any asset work starts.
//!
//! # Example
//! ```ignore
//! let controller = CustomizationController::builder("ring-001", cache, TokioSpawner::new())
//!     .initial_material("18k-rose-gold")
//!     .mount()?;
//! controller.initialize().await?;
//! controller.change_material("platinum").await?;
//! ```

pub mod events;
pub mod snapshot;

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::{AssetCache, FetchPriority};
use crate::catalog::MaterialCatalog;
use crate::config::CustomizerConfig;
use crate::error::{CustomizerError, Result};
use crate::loader::{AssetBundle, AssetSource};
use crate::pricing::{CartSink, CatalogPricing, PriceCalculator, PriceQuote};
use crate::runtime::{AsyncSpawner, TaskHandle};
use crate::viewer::RotationSink;

pub use events::{CustomizerEvent, CustomizerObserver, EventLog};
pub use snapshot::{
    normalize_engraving, wrap_frame, CustomizationOptions, CustomizerSnapshot, RingSize,
    RotationState,
};

/// Builder for [`CustomizationController`]
pub struct ControllerBuilder<S: AssetSource, R: AsyncSpawner> {
    product_id: String,
    cache: AssetCache<S>,
    spawner: R,
    config: CustomizerConfig,
    catalog: Option<Arc<MaterialCatalog>>,
    pricing: Option<Arc<dyn PriceCalculator>>,
    initial_material: Option<String>,
}

impl<S: AssetSource, R: AsyncSpawner> ControllerBuilder<S, R> {
    pub fn config(mut self, config: CustomizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(mut self, catalog: Arc<MaterialCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Price collaborator; defaults to catalog pricing
    pub fn pricing(mut self, pricing: Arc<dyn PriceCalculator>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Material selected at mount; defaults to the catalog's first material
    pub fn initial_material(mut self, material_id: impl Into<String>) -> Self {
        self.initial_material = Some(material_id.into());
        self
    }

    /// Create the controller in its loading state
    pub fn mount(self) -> Result<CustomizationController<S, R>> {
        let catalog = self.catalog.unwrap_or_default();
        let material_id = match self.initial_material {
            Some(id) => catalog.require_material(&id)?.id.clone(),
            None => catalog.default_material().id.clone(),
        };
        let pricing: Arc<dyn PriceCalculator> = match self.pricing {
            Some(pricing) => pricing,
            None => Arc::new(CatalogPricing::new(
                Arc::clone(&catalog),
                self.config.base_price_cents,
            )),
        };

        let rotation = RotationState::new(
            self.config.total_frames,
            self.config.features.auto_rotate,
        );
        let mut snapshot = CustomizerSnapshot::new(material_id.clone(), rotation);
        snapshot.price = quote(pricing.as_ref(), &material_id, None);

        let (state, _) = watch::channel(snapshot);
        let (prefetched, _) = watch::channel(false);
        let id = Uuid::new_v4();
        log::debug!(
            "Mounted customizer {id} for {} with {material_id}",
            self.product_id
        );

        Ok(CustomizationController {
            inner: Arc::new(ControllerInner {
                id,
                product_id: self.product_id,
                catalog,
                cache: self.cache,
                pricing,
                spawner: self.spawner,
                engraving_max_chars: self.config.engraving_max_chars,
                state,
                generation: AtomicU64::new(0),
                observers: RwLock::new(Vec::new()),
                cancel: CancellationToken::new(),
                prefetch_started: AtomicBool::new(false),
                prefetch_task: Mutex::new(None),
                prefetched,
            }),
        })
    }
}

struct ControllerInner<S: AssetSource, R: AsyncSpawner> {
    id: Uuid,
    product_id: String,
    catalog: Arc<MaterialCatalog>,
    cache: AssetCache<S>,
    pricing: Arc<dyn PriceCalculator>,
    spawner: R,
    engraving_max_chars: usize,
    state: watch::Sender<CustomizerSnapshot>,
    /// Bumped by every asset request; responses from older requests are dropped
    generation: AtomicU64,
    observers: RwLock<Vec<Arc<dyn CustomizerObserver>>>,
    cancel: CancellationToken,
    prefetch_started: AtomicBool,
    prefetch_task: Mutex<Option<TaskHandle>>,
    prefetched: watch::Sender<bool>,
}

/// Orchestrates material selection, rotation and asset loading
///
/// Cloning yields another handle to the same controller.
pub struct CustomizationController<S: AssetSource, R: AsyncSpawner> {
    inner: Arc<ControllerInner<S, R>>,
}

impl<S: AssetSource, R: AsyncSpawner> Clone for CustomizationController<S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: AssetSource, R: AsyncSpawner> CustomizationController<S, R> {
    /// Start building a controller for one product
    pub fn builder(
        product_id: impl Into<String>,
        cache: AssetCache<S>,
        spawner: R,
    ) -> ControllerBuilder<S, R> {
        ControllerBuilder {
            product_id: product_id.into(),
            cache,
            spawner,
            config: CustomizerConfig::default(),
            catalog: None,
            pricing: None,
            initial_material: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn product_id(&self) -> &str {
        &self.inner.product_id
    }

    pub fn catalog(&self) -> &MaterialCatalog {
        &self.inner.catalog
    }

    pub fn cache(&self) -> &AssetCache<S> {
        &self.inner.cache
    }

    /// Current state
    pub fn snapshot(&self) -> CustomizerSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver that sees every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<CustomizerSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn add_observer(&self, observer: Arc<dyn CustomizerObserver>) {
        self.inner.observers.write().push(observer);
    }

    pub fn is_mounted(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    /// Load the initial material, then warm the cache for the others
    ///
    /// The prefetch runs in the background and never delays this call. If a
    /// material change supersedes this load, that change starts the prefetch.
    pub async fn initialize(&self) -> Result<Arc<AssetBundle>> {
        let material_id = self.inner.state.borrow().selected_material_id.clone();
        let generation = self.next_generation();
        let bundle = self.load(generation, &material_id).await?;
        self.start_prefetch();
        Ok(bundle)
    }

    /// Select a material
    ///
    /// Selection, auto-rotate reset and the price notification happen before
    /// this future first yields. A cache hit swaps the assets in the same
    /// update. Returns `Cancelled` if a later request superseded this one.
    pub async fn change_material(&self, material_id: &str) -> Result<()> {
        self.ensure_mounted()?;
        let material_id = self.inner.catalog.require_material(material_id)?.id.clone();
        let generation = self.next_generation();
        let cached = self
            .inner
            .cache
            .get_cached(&self.inner.product_id, &material_id);

        let mut price = None;
        self.update(|s| {
            s.selected_material_id = material_id.clone();
            s.rotation.is_auto_rotating = false;
            s.price = quote(
                self.inner.pricing.as_ref(),
                &material_id,
                s.options.stone_quality_id.as_deref(),
            );
            price = s.price.clone();
            s.error = None;
            match &cached {
                Some(bundle) => {
                    s.assets = Some(Arc::clone(bundle));
                    s.is_loading = false;
                }
                None => s.is_loading = true,
            }
        });

        self.notify(CustomizerEvent::MaterialSelected {
            material_id: material_id.clone(),
        });
        if let Some(price) = price {
            self.notify(CustomizerEvent::PriceChanged(price));
        }

        if cached.is_some() {
            log::debug!("[{}] {material_id} served from cache", self.inner.id);
            self.notify(CustomizerEvent::AssetsLoaded {
                material_id,
                from_cache: true,
            });
            self.start_prefetch();
            return Ok(());
        }

        self.load(generation, &material_id).await?;
        self.start_prefetch();
        Ok(())
    }

    /// Re-fetch assets for the selected material after a failure
    pub async fn retry(&self) -> Result<()> {
        self.ensure_mounted()?;
        let material_id = self.inner.state.borrow().selected_material_id.clone();
        let generation = self.next_generation();
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
        log::debug!("[{}] retrying {material_id}", self.inner.id);

        self.load(generation, &material_id).await?;
        self.start_prefetch();
        Ok(())
    }

    pub fn set_frame(&self, frame: i64) -> usize {
        self.rotate(|rotation| rotation.set_frame(frame))
    }

    pub fn next_frame(&self) -> usize {
        self.rotate(RotationState::next)
    }

    pub fn previous_frame(&self) -> usize {
        self.rotate(RotationState::previous)
    }

    pub fn set_auto_rotate(&self, enabled: bool) {
        self.update(|s| s.rotation.is_auto_rotating = enabled);
    }

    /// Choose a stone grade (or none) and announce the new price
    pub fn select_stone_quality(
        &self,
        stone_quality_id: Option<&str>,
    ) -> Result<Option<PriceQuote>> {
        self.ensure_mounted()?;
        let stone_quality_id = match stone_quality_id {
            Some(id) => Some(
                self.inner
                    .catalog
                    .stone_quality(id)
                    .ok_or_else(|| CustomizerError::UnknownStoneQuality(id.to_string()))?
                    .id
                    .clone(),
            ),
            None => None,
        };

        let mut price = None;
        self.update(|s| {
            s.price = quote(
                self.inner.pricing.as_ref(),
                &s.selected_material_id,
                stone_quality_id.as_deref(),
            );
            s.options.stone_quality_id = stone_quality_id;
            price = s.price.clone();
        });
        if let Some(price) = &price {
            self.notify(CustomizerEvent::PriceChanged(price.clone()));
        }
        Ok(price)
    }

    pub fn set_ring_size(&self, size: Option<f32>) -> Result<()> {
        self.ensure_mounted()?;
        let size = size.map(RingSize::new).transpose()?;
        self.update(|s| s.options.ring_size = size);
        Ok(())
    }

    /// Set engraving text; blank text removes the engraving
    pub fn set_engraving(&self, text: &str) -> Result<()> {
        self.ensure_mounted()?;
        let engraving = normalize_engraving(text, self.inner.engraving_max_chars)?;
        self.update(|s| s.options.engraving = engraving);
        Ok(())
    }

    /// Hand the current customization to the cart
    ///
    /// A rejection comes back as a retryable `Cart` error and leaves the
    /// customizer untouched.
    pub async fn add_to_cart(&self, cart: &dyn CartSink) -> Result<PriceQuote> {
        self.ensure_mounted()?;
        let snapshot = self.snapshot();
        let total_cents = self.inner.pricing.total_price(
            &snapshot.selected_material_id,
            snapshot.options.stone_quality_id.as_deref(),
        )?;

        let outcome = tokio::select! {
            _ = self.inner.cancel.cancelled() => return Err(CustomizerError::Cancelled),
            outcome = cart.add_to_cart(&snapshot, total_cents) => outcome,
        };

        match outcome {
            Ok(()) => {
                log::info!(
                    "[{}] added {} to cart at {total_cents} cents",
                    self.inner.id,
                    snapshot.selected_material_id
                );
                self.notify(CustomizerEvent::CartSubmitted { total_cents });
                Ok(PriceQuote {
                    material_id: snapshot.selected_material_id,
                    stone_quality_id: snapshot.options.stone_quality_id,
                    total_cents,
                })
            }
            Err(err) => {
                log::warn!("[{}] cart rejected customization: {err:#}", self.inner.id);
                let error = CustomizerError::Cart {
                    message: err.to_string(),
                    retryable: true,
                };
                self.notify(CustomizerEvent::CartFailed(error.clone()));
                Err(error)
            }
        }
    }

    /// Resolves once the background prefetch of other materials has finished
    ///
    /// Never resolves if the spawner discarded the prefetch task.
    pub async fn prefetch_settled(&self) {
        let mut done = self.inner.prefetched.subscribe();
        let _ = done.wait_for(|finished| *finished).await;
    }

    /// Cancel in-flight work; later state updates become no-ops
    pub fn unmount(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();
        if let Some(task) = self.inner.prefetch_task.lock().take() {
            task.abort();
        }
        self.inner.observers.write().clear();
        log::debug!("Unmounted customizer {}", self.inner.id);
    }

    fn ensure_mounted(&self) -> Result<()> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(CustomizerError::Cancelled)
        }
    }

    fn next_generation(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    /// Fetch a material and apply the outcome if no newer request exists
    async fn load(&self, generation: u64, material_id: &str) -> Result<Arc<AssetBundle>> {
        let fetch = self
            .inner
            .cache
            .fetch(&self.inner.product_id, material_id, FetchPriority::High);
        let result = tokio::select! {
            _ = self.inner.cancel.cancelled() => return Err(CustomizerError::Cancelled),
            result = fetch => result,
        };

        // Checked inside the state lock so a concurrent selection cannot
        // interleave between the check and the write.
        let applied = self.inner.state.send_if_modified(|s| {
            if self.inner.cancel.is_cancelled()
                || !self.is_current(generation)
                || s.selected_material_id != material_id
            {
                return false;
            }
            s.is_loading = false;
            match &result {
                Ok(bundle) => {
                    if bundle.frame_count != s.rotation.total_frames {
                        log::warn!(
                            "{material_id} has {} frames, viewer keeps {}",
                            bundle.frame_count,
                            s.rotation.total_frames
                        );
                    }
                    s.assets = Some(Arc::clone(bundle));
                    s.error = None;
                }
                Err(err) => s.error = Some(err.clone()),
            }
            true
        });

        if !applied {
            log::debug!(
                "[{}] discarding superseded response for {material_id}",
                self.inner.id
            );
            return Err(CustomizerError::Cancelled);
        }

        match &result {
            Ok(_) => self.notify(CustomizerEvent::AssetsLoaded {
                material_id: material_id.to_string(),
                from_cache: false,
            }),
            Err(err) => {
                log::warn!("[{}] loading {material_id} failed: {err}", self.inner.id);
                self.notify(CustomizerEvent::AssetsFailed {
                    material_id: material_id.to_string(),
                    error: err.clone(),
                });
            }
        }
        result
    }

    /// Warm the cache for every other material, once per controller
    ///
    /// Started by the first successful load, whichever call made it.
    fn start_prefetch(&self) {
        if self.inner.prefetch_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let selected = self.inner.state.borrow().selected_material_id.clone();
        let others = self.inner.catalog.other_material_ids(&selected);
        let cache = self.inner.cache.clone();
        let product_id = self.inner.product_id.clone();
        let cancel = self.inner.cancel.clone();
        let inner = Arc::clone(&self.inner);

        let task = self.inner.spawner.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = cache.prefetch_materials(&product_id, others, FetchPriority::High) => {}
            }
            inner.prefetched.send_replace(true);
        });
        *self.inner.prefetch_task.lock() = Some(task);
    }

    fn rotate(&self, step: impl FnOnce(&mut RotationState) -> usize) -> usize {
        let mut frame = self.inner.state.borrow().rotation.current_frame;
        self.update(|s| frame = step(&mut s.rotation));
        frame
    }

    fn update(&self, apply: impl FnOnce(&mut CustomizerSnapshot)) {
        if self.inner.cancel.is_cancelled() {
            log::trace!("[{}] ignoring update after unmount", self.inner.id);
            return;
        }
        self.inner.state.send_modify(apply);
    }

    fn notify(&self, event: CustomizerEvent) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let observers = self.inner.observers.read().clone();
        for observer in observers {
            observer.on_event(&event);
        }
    }
}

impl<S: AssetSource, R: AsyncSpawner> RotationSink for CustomizationController<S, R> {
    fn current_frame(&self) -> usize {
        self.inner.state.borrow().rotation.current_frame
    }

    fn on_frame_change(&self, frame: usize) {
        self.set_frame(frame as i64);
    }

    fn is_auto_rotating(&self) -> bool {
        self.inner.state.borrow().rotation.is_auto_rotating
    }

    fn set_auto_rotate(&self, enabled: bool) {
        CustomizationController::set_auto_rotate(self, enabled);
    }
}

fn quote(
    pricing: &dyn PriceCalculator,
    material_id: &str,
    stone_quality_id: Option<&str>,
) -> Option<PriceQuote> {
    match pricing.total_price(material_id, stone_quality_id) {
        Ok(total_cents) => Some(PriceQuote {
            material_id: material_id.to_string(),
            stone_quality_id: stone_quality_id.map(str::to_string),
            total_cents,
        }),
        Err(err) => {
            log::warn!("Pricing {material_id} failed: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::mock::{MockAssetSource, MockBehavior};
    use crate::runtime::MockSpawner;

    fn controller(
        source: &MockAssetSource,
    ) -> CustomizationController<MockAssetSource, MockSpawner> {
        let cache = AssetCache::new(source.clone(), 4);
        CustomizationController::builder("ring-001", cache, MockSpawner::blocking())
            .mount()
            .unwrap()
    }

    #[test]
    fn test_mount_defaults() {
        let source = MockAssetSource::default();
        let controller = controller(&source);
        let snapshot = controller.snapshot();

        assert_eq!(snapshot.selected_material_id, "18k-rose-gold");
        assert!(snapshot.is_loading);
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.rotation.total_frames, 36);
        assert_eq!(snapshot.price.unwrap().total_cents, 120_000);
    }

    #[test]
    fn test_unknown_initial_material() {
        let cache = AssetCache::new(MockAssetSource::default(), 4);
        let result = CustomizationController::builder("ring-001", cache, MockSpawner::new())
            .initial_material("copper")
            .mount();
        assert!(matches!(result, Err(CustomizerError::UnknownMaterial(_))));
    }

    #[tokio::test]
    async fn test_initialize_prefetches_others() {
        let source = MockAssetSource::default();
        let controller = controller(&source);

        controller.initialize().await.unwrap();
        controller.prefetch_settled().await;

        assert_eq!(source.call_count(), 4);
        assert!(controller.cache().get_cached("ring-001", "platinum").is_some());
    }

    #[tokio::test]
    async fn test_failed_initialize_skips_prefetch() {
        let source = MockAssetSource::default();
        source.set_behavior("18k-rose-gold", MockBehavior::Unavailable);
        let controller = controller(&source);

        let err = controller.initialize().await.unwrap_err();
        assert!(matches!(err, CustomizerError::AssetsUnavailable { .. }));
        assert_eq!(source.call_count(), 1);

        let snapshot = controller.snapshot();
        assert!(!snapshot.is_loading);
        assert!(snapshot.can_retry());
    }

    #[tokio::test]
    async fn test_switch_after_failed_initialize_prefetches() {
        let source = MockAssetSource::default();
        source.set_behavior("18k-rose-gold", MockBehavior::Unavailable);
        let controller = controller(&source);
        assert!(controller.initialize().await.is_err());

        controller.change_material("platinum").await.unwrap();
        controller.prefetch_settled().await;

        let cache = controller.cache();
        assert!(cache.get_cached("ring-001", "18k-white-gold").is_some());
        assert!(cache.get_cached("ring-001", "18k-yellow-gold").is_some());
        assert!(cache.get_cached("ring-001", "18k-rose-gold").is_none());
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let source = MockAssetSource::default();
        source.set_behavior("18k-rose-gold", MockBehavior::NetworkFailure);
        let controller = controller(&source);
        assert!(controller.initialize().await.is_err());

        source.set_behavior("18k-rose-gold", MockBehavior::Serve);
        controller.retry().await.unwrap();

        let snapshot = controller.snapshot();
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.assets.unwrap().material_id, "18k-rose-gold");
    }

    #[tokio::test]
    async fn test_stone_quality_reprices() {
        let source = MockAssetSource::default();
        let controller = controller(&source);
        let log = Arc::new(EventLog::new());
        controller.add_observer(log.clone());

        let quote = controller.select_stone_quality(Some("excellent")).unwrap().unwrap();
        assert_eq!(quote.total_cents, 240_000);
        assert_eq!(log.prices(), vec![quote]);

        assert!(matches!(
            controller.select_stone_quality(Some("flawless")),
            Err(CustomizerError::UnknownStoneQuality(_))
        ));
    }

    #[test]
    fn test_options_validation() {
        let source = MockAssetSource::default();
        let controller = controller(&source);

        controller.set_ring_size(Some(7.0)).unwrap();
        assert!(controller.set_ring_size(Some(7.2)).is_err());
        controller.set_engraving("  forever ").unwrap();

        let options = controller.snapshot().options;
        assert_eq!(options.ring_size.unwrap().value(), 7.0);
        assert_eq!(options.engraving.as_deref(), Some("forever"));
    }

    #[test]
    fn test_frame_navigation_wraps() {
        let source = MockAssetSource::default();
        let controller = controller(&source);

        assert_eq!(controller.previous_frame(), 35);
        assert_eq!(controller.next_frame(), 0);
        assert_eq!(controller.set_frame(-1), 35);
        assert_eq!(controller.set_frame(73), 1);
    }

    #[tokio::test]
    async fn test_unmount_freezes_state() {
        let source = MockAssetSource::default();
        let controller = controller(&source);
        controller.unmount();

        controller.set_frame(5);
        assert_eq!(controller.snapshot().rotation.current_frame, 0);
        assert!(matches!(
            controller.change_material("platinum").await,
            Err(CustomizerError::Cancelled)
        ));
        assert_eq!(source.call_count(), 0);
    }
}
