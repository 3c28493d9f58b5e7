//! Static material and stone-quality catalog

use serde::{Deserialize, Serialize};

use crate::error::{CustomizerError, Result};

/// How a material changes the product price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PriceModifier {
    /// Added to the base price, in cents (may be negative)
    Additive(i64),
    /// Scales the base price
    Multiplier(f64),
}

impl PriceModifier {
    /// Apply the modifier to a base price in cents, clamping at zero
    pub fn apply(&self, base_cents: u64) -> u64 {
        match *self {
            Self::Additive(delta) => (base_cents as i64).saturating_add(delta).max(0) as u64,
            Self::Multiplier(factor) => (base_cents as f64 * factor).round().max(0.0) as u64,
        }
    }
}

/// Physically-based rendering hints, only consumed by the GPU tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PbrHints {
    pub metalness: f32,
    pub roughness: f32,
    pub reflectivity: f32,
    /// Linear RGB
    pub base_color: [f32; 3],
}

/// One selectable metal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialOption {
    pub id: String,
    pub name: String,
    pub price_modifier: PriceModifier,
    pub pbr: PbrHints,
}

/// One selectable center-stone grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoneQuality {
    pub id: String,
    pub name: String,
    pub price_delta_cents: u64,
}

/// Immutable list of materials and stone qualities for a product line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialCatalog {
    materials: Vec<MaterialOption>,
    #[serde(default)]
    stone_qualities: Vec<StoneQuality>,
}

impl MaterialCatalog {
    /// Build a catalog; the first material is the default selection
    pub fn new(materials: Vec<MaterialOption>, stone_qualities: Vec<StoneQuality>) -> Result<Self> {
        if materials.is_empty() {
            return Err(CustomizerError::InvalidOption(
                "catalog needs at least one material".to_string(),
            ));
        }
        Ok(Self {
            materials,
            stone_qualities,
        })
    }

    /// Parse a catalog from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(json)?;
        Self::new(catalog.materials, catalog.stone_qualities)
    }

    pub fn materials(&self) -> &[MaterialOption] {
        &self.materials
    }

    pub fn stone_qualities(&self) -> &[StoneQuality] {
        &self.stone_qualities
    }

    pub fn material(&self, id: &str) -> Option<&MaterialOption> {
        self.materials.iter().find(|m| m.id == id)
    }

    pub fn stone_quality(&self, id: &str) -> Option<&StoneQuality> {
        self.stone_qualities.iter().find(|q| q.id == id)
    }

    /// Look up a material or fail with `UnknownMaterial`
    pub fn require_material(&self, id: &str) -> Result<&MaterialOption> {
        self.material(id)
            .ok_or_else(|| CustomizerError::UnknownMaterial(id.to_string()))
    }

    pub fn default_material(&self) -> &MaterialOption {
        &self.materials[0]
    }

    /// Ids of every material except `id`, in catalog order
    pub fn other_material_ids(&self, id: &str) -> Vec<String> {
        self.materials
            .iter()
            .filter(|m| m.id != id)
            .map(|m| m.id.clone())
            .collect()
    }
}

fn metal(
    id: &str,
    name: &str,
    modifier: PriceModifier,
    color: [f32; 3],
    roughness: f32,
) -> MaterialOption {
    MaterialOption {
        id: id.to_string(),
        name: name.to_string(),
        price_modifier: modifier,
        pbr: PbrHints {
            metalness: 1.0,
            roughness,
            reflectivity: 0.9,
            base_color: color,
        },
    }
}

fn quality(id: &str, name: &str, price_delta_cents: u64) -> StoneQuality {
    StoneQuality {
        id: id.to_string(),
        name: name.to_string(),
        price_delta_cents,
    }
}

impl Default for MaterialCatalog {
    /// The storefront's ring metals and diamond grades
    fn default() -> Self {
        Self {
            materials: vec![
                metal(
                    "18k-rose-gold",
                    "18K Rose Gold",
                    PriceModifier::Additive(0),
                    [0.92, 0.64, 0.54],
                    0.18,
                ),
                metal(
                    "18k-yellow-gold",
                    "18K Yellow Gold",
                    PriceModifier::Additive(0),
                    [1.0, 0.78, 0.34],
                    0.18,
                ),
                metal(
                    "18k-white-gold",
                    "18K White Gold",
                    PriceModifier::Additive(5_000),
                    [0.91, 0.9, 0.87],
                    0.15,
                ),
                metal(
                    "platinum",
                    "Platinum",
                    PriceModifier::Multiplier(1.35),
                    [0.9, 0.89, 0.88],
                    0.12,
                ),
            ],
            stone_qualities: vec![
                quality("good", "Good (SI1, H)", 0),
                quality("very-good", "Very Good (VS2, G)", 45_000),
                quality("excellent", "Excellent (VVS1, E)", 120_000),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_modifier_apply() {
        assert_eq!(PriceModifier::Additive(5_000).apply(100_000), 105_000);
        assert_eq!(PriceModifier::Additive(-200_000).apply(100_000), 0);
        assert_eq!(PriceModifier::Multiplier(1.35).apply(100_000), 135_000);
    }

    #[test]
    fn test_default_catalog() {
        let catalog = MaterialCatalog::default();
        assert_eq!(catalog.default_material().id, "18k-rose-gold");
        assert!(catalog.material("platinum").is_some());
        assert_eq!(catalog.other_material_ids("platinum").len(), 3);
    }

    #[test]
    fn test_require_unknown_material() {
        let catalog = MaterialCatalog::default();
        assert_eq!(
            catalog.require_material("tin").unwrap_err(),
            CustomizerError::UnknownMaterial("tin".to_string())
        );
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"{
            "materials": [{
                "id": "silver",
                "name": "Sterling Silver",
                "price_modifier": { "kind": "multiplier", "value": 0.5 },
                "pbr": { "metalness": 1.0, "roughness": 0.3, "reflectivity": 0.8, "base_color": [0.9, 0.9, 0.9] }
            }]
        }"#;
        let catalog = MaterialCatalog::from_json(json).unwrap();
        assert_eq!(catalog.default_material().name, "Sterling Silver");
        assert!(catalog.stone_qualities().is_empty());
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(MaterialCatalog::from_json(r#"{ "materials": [] }"#).is_err());
    }
}
