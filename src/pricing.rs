//! Price computation and cart hand-off seams
//!
//! Both collaborators live outside the customizer. The controller calls the
//! price calculator synchronously on every selection and hands finished
//! customizations to a cart sink.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::MaterialCatalog;
use crate::controller::CustomizerSnapshot;
use crate::error::{CustomizerError, Result};

/// A computed price for one selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub material_id: String,
    pub stone_quality_id: Option<String>,
    pub total_cents: u64,
}

/// Computes the total price of a selection
pub trait PriceCalculator: Send + Sync {
    fn total_price(&self, material_id: &str, stone_quality_id: Option<&str>) -> Result<u64>;
}

/// Prices from the catalog: base price, material modifier, then stone delta
#[derive(Debug, Clone)]
pub struct CatalogPricing {
    catalog: Arc<MaterialCatalog>,
    base_price_cents: u64,
}

impl CatalogPricing {
    pub fn new(catalog: Arc<MaterialCatalog>, base_price_cents: u64) -> Self {
        Self {
            catalog,
            base_price_cents,
        }
    }
}

impl PriceCalculator for CatalogPricing {
    fn total_price(&self, material_id: &str, stone_quality_id: Option<&str>) -> Result<u64> {
        let material = self.catalog.require_material(material_id)?;
        let mut total = material.price_modifier.apply(self.base_price_cents);

        if let Some(id) = stone_quality_id {
            let stone = self
                .catalog
                .stone_quality(id)
                .ok_or_else(|| CustomizerError::UnknownStoneQuality(id.to_string()))?;
            total = total.saturating_add(stone.price_delta_cents);
        }

        Ok(total)
    }
}

/// Receives a finished customization
///
/// Implementations may reject; the controller reports that as a retryable
/// [`CustomizerError::Cart`].
#[async_trait]
pub trait CartSink: Send + Sync {
    async fn add_to_cart(
        &self,
        snapshot: &CustomizerSnapshot,
        total_cents: u64,
    ) -> anyhow::Result<()>;
}
