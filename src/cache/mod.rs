//! Asset bundle caching with request coalescing
//!
//! This module provides the session cache that maps `(product, material)` to
//! resolved asset bundles, plus priority-ordered background prefetching.
//! Entries never expire; a fresh cache starts empty.

pub mod gate;
pub mod metrics;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::Result;
use crate::loader::{AssetBundle, AssetSource};
use metrics::AssetMetricsHandle;

pub use gate::{FetchGate, FetchPermit, FetchPriority};

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<AssetBundle>>>>;

/// Identity of one cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    pub product_id: String,
    pub material_id: String,
}

impl AssetKey {
    pub fn new(product_id: impl Into<String>, material_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            material_id: material_id.into(),
        }
    }

    fn hash64(&self) -> u64 {
        let joined = format!("{}\u{0}{}", self.product_id, self.material_id);
        xxh3_64(joined.as_bytes())
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product_id, self.material_id)
    }
}

struct CacheInner<S: AssetSource> {
    source: S,
    entries: RwLock<HashMap<u64, Arc<AssetBundle>>>,
    in_flight: Mutex<HashMap<u64, SharedFetch>>,
    gate: FetchGate,
    metrics: AssetMetricsHandle,
}

/// Session cache of asset bundles
///
/// Cloning yields another handle to the same cache, so several controllers
/// on one page can share entries and in-flight requests.
pub struct AssetCache<S: AssetSource> {
    inner: Arc<CacheInner<S>>,
}

impl<S: AssetSource> Clone for AssetCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: AssetSource> AssetCache<S> {
    /// Creates a cache over `source` allowing `max_concurrent_fetches`
    /// simultaneous transport requests
    pub fn new(source: S, max_concurrent_fetches: usize) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                gate: FetchGate::new(max_concurrent_fetches),
                metrics: AssetMetricsHandle::new(),
            }),
        }
    }

    /// Synchronous lookup with no side effects
    pub fn get_cached(&self, product_id: &str, material_id: &str) -> Option<Arc<AssetBundle>> {
        let hash = AssetKey::new(product_id, material_id).hash64();
        self.inner.entries.read().get(&hash).cloned()
    }

    /// Whether a fetch for this key is currently running
    pub fn is_in_flight(&self, product_id: &str, material_id: &str) -> bool {
        let hash = AssetKey::new(product_id, material_id).hash64();
        self.inner.in_flight.lock().contains_key(&hash)
    }

    /// Gets a bundle from cache or fetches it
    ///
    /// Concurrent calls for the same key share one request.
    pub async fn fetch(
        &self,
        product_id: &str,
        material_id: &str,
        priority: FetchPriority,
    ) -> Result<Arc<AssetBundle>> {
        if let Some(bundle) = self.get_cached(product_id, material_id) {
            self.inner.metrics.record_cache_hit();
            return Ok(bundle);
        }
        self.inner.metrics.record_cache_miss();

        self.join_or_start(AssetKey::new(product_id, material_id), priority)
            .await
    }

    /// Warm the cache for several materials in the background
    ///
    /// Resolves once every requested material has been attempted. Failures
    /// are logged and never surface to the caller.
    pub async fn prefetch_materials<I, M>(
        &self,
        product_id: &str,
        material_ids: I,
        priority: FetchPriority,
    )
    where
        I: IntoIterator<Item = M>,
        M: AsRef<str>,
    {
        let pending: Vec<_> = material_ids
            .into_iter()
            .filter(|m| self.get_cached(product_id, m.as_ref()).is_none())
            .map(|m| {
                let key = AssetKey::new(product_id, m.as_ref());
                let fetch = self.join_or_start(key.clone(), priority);
                async move { (key, fetch.await) }
            })
            .collect();

        if pending.is_empty() {
            return;
        }
        log::debug!("Prefetching {} bundles for {product_id} ({priority:?})", pending.len());

        for (key, result) in future::join_all(pending).await {
            if let Err(err) = result {
                log::warn!("Prefetch of {key} failed: {err}");
            }
        }
    }

    /// Seed the cache with a bundle obtained elsewhere
    pub fn insert(&self, bundle: AssetBundle) {
        let hash = AssetKey::new(&bundle.product_id, &bundle.material_id).hash64();
        self.inner.entries.write().insert(hash, Arc::new(bundle));
    }

    /// Number of cached bundles
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all cached bundles; in-flight requests still complete
    pub fn clear(&self) {
        self.inner.entries.write().clear();
    }

    /// Get a reference to the metrics handle
    pub fn metrics(&self) -> &AssetMetricsHandle {
        &self.inner.metrics
    }

    /// Return the in-flight request for a key, starting one if needed
    fn join_or_start(&self, key: AssetKey, priority: FetchPriority) -> SharedFetch {
        let hash = key.hash64();
        let mut in_flight = self.inner.in_flight.lock();

        if let Some(existing) = in_flight.get(&hash) {
            self.inner.metrics.record_coalesced();
            return existing.clone();
        }

        // A request may have completed between the caller's lookup and now.
        if let Some(bundle) = self.inner.entries.read().get(&hash) {
            return future::ready(Ok(Arc::clone(bundle))).boxed().shared();
        }

        let inner = Arc::clone(&self.inner);
        let fetch = async move { inner.fetch_uncached(key, priority).await }
            .boxed()
            .shared();
        in_flight.insert(hash, fetch.clone());
        fetch
    }
}

impl<S: AssetSource> CacheInner<S> {
    async fn fetch_uncached(
        &self,
        key: AssetKey,
        priority: FetchPriority,
    ) -> Result<Arc<AssetBundle>> {
        let hash = key.hash64();
        let result = self.fetch_from_source(&key, priority).await;

        match &result {
            Ok(bundle) => {
                self.entries.write().insert(hash, Arc::clone(bundle));
            }
            Err(err) => {
                self.metrics.record_failure();
                log::warn!("Fetching assets for {key} failed: {err}");
            }
        }
        self.in_flight.lock().remove(&hash);

        result
    }

    async fn fetch_from_source(
        &self,
        key: &AssetKey,
        priority: FetchPriority,
    ) -> Result<Arc<AssetBundle>> {
        let _permit = self.gate.acquire(priority).await?;

        let start_time = Instant::now();
        self.metrics.record_network_fetch(key.to_string());
        let bundle = self
            .source
            .fetch_assets(&key.product_id, &key.material_id)
            .await?;
        self.metrics
            .record_load_time(key.to_string(), start_time.elapsed());

        log::debug!(
            "Loaded {} ({} paths, {} frames)",
            key,
            bundle.asset_paths.len(),
            bundle.frame_count
        );
        Ok(Arc::new(bundle))
    }
}
