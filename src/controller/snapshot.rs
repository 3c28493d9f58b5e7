//! Customizer state published by the controller
//!
//! A [`CustomizerSnapshot`] is replaced wholesale on every change, so
//! subscribers always see a consistent picture.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{CustomizerError, Result};
use crate::loader::AssetBundle;
use crate::pricing::PriceQuote;

/// Reduce any frame index into `[0, total_frames)`, wrapping both ways
pub fn wrap_frame(frame: i64, total_frames: usize) -> usize {
    let total = total_frames.max(1) as i64;
    frame.rem_euclid(total) as usize
}

/// Rotation of the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    pub current_frame: usize,
    pub is_auto_rotating: bool,
    /// Fixed for the lifetime of a controller
    pub total_frames: usize,
}

impl RotationState {
    pub fn new(total_frames: usize, is_auto_rotating: bool) -> Self {
        Self {
            current_frame: 0,
            is_auto_rotating,
            total_frames: total_frames.max(1),
        }
    }

    pub fn set_frame(&mut self, frame: i64) -> usize {
        self.current_frame = wrap_frame(frame, self.total_frames);
        self.current_frame
    }

    pub fn next(&mut self) -> usize {
        self.set_frame(self.current_frame as i64 + 1)
    }

    pub fn previous(&mut self) -> usize {
        self.set_frame(self.current_frame as i64 - 1)
    }
}

/// US ring size, stored in half steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct RingSize(u8);

impl RingSize {
    pub const MIN: f32 = 3.0;
    pub const MAX: f32 = 13.0;

    /// Accepts sizes from 3 to 13 in steps of one half
    pub fn new(size: f32) -> Result<Self> {
        let halves = size * 2.0;
        if !(Self::MIN..=Self::MAX).contains(&size) || halves.fract() != 0.0 {
            return Err(CustomizerError::InvalidOption(format!(
                "ring size {size} is not a half size between {} and {}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(halves as u8))
    }

    pub fn value(&self) -> f32 {
        f32::from(self.0) / 2.0
    }
}

impl TryFrom<f32> for RingSize {
    type Error = CustomizerError;

    fn try_from(size: f32) -> Result<Self> {
        Self::new(size)
    }
}

impl From<RingSize> for f32 {
    fn from(size: RingSize) -> Self {
        size.value()
    }
}

impl fmt::Display for RingSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Non-material selections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationOptions {
    pub stone_quality_id: Option<String>,
    pub ring_size: Option<RingSize>,
    pub engraving: Option<String>,
}

/// Trim and check engraving text; empty text clears the engraving
pub fn normalize_engraving(text: &str, max_chars: usize) -> Result<Option<String>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max_chars {
        return Err(CustomizerError::InvalidOption(format!(
            "engraving is limited to {max_chars} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(CustomizerError::InvalidOption(
            "engraving contains control characters".to_string(),
        ));
    }
    Ok(Some(trimmed.to_string()))
}

/// Complete customizer state
///
/// `is_loading` and `error` are never both set. `assets` is `None` only
/// while the first fetch is pending or after it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomizerSnapshot {
    pub selected_material_id: String,
    pub rotation: RotationState,
    pub assets: Option<Arc<AssetBundle>>,
    pub is_loading: bool,
    pub error: Option<CustomizerError>,
    pub options: CustomizationOptions,
    pub price: Option<PriceQuote>,
}

impl CustomizerSnapshot {
    pub fn new(material_id: impl Into<String>, rotation: RotationState) -> Self {
        Self {
            selected_material_id: material_id.into(),
            rotation,
            assets: None,
            is_loading: true,
            error: None,
            options: CustomizationOptions::default(),
            price: None,
        }
    }

    /// Message for the inline error banner
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Whether a retry control should be offered
    pub fn can_retry(&self) -> bool {
        self.error.as_ref().is_some_and(CustomizerError::is_retryable)
    }

    /// Base path of the frame currently selected, if assets are present
    pub fn current_asset_path(&self) -> Option<&str> {
        self.assets
            .as_ref()
            .and_then(|bundle| bundle.path_for_frame(self.rotation.current_frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_frame() {
        assert_eq!(wrap_frame(-1, 36), 35);
        assert_eq!(wrap_frame(36, 36), 0);
        assert_eq!(wrap_frame(-37, 36), 35);
        assert_eq!(wrap_frame(1000, 36), 1000 % 36);
        assert_eq!(wrap_frame(5, 0), 0);
    }

    #[test]
    fn test_rotation_wraps() {
        let mut rotation = RotationState::new(36, false);
        assert_eq!(rotation.previous(), 35);
        assert_eq!(rotation.next(), 0);
        assert_eq!(rotation.set_frame(-72), 0);
        assert_eq!(rotation.set_frame(71), 35);
    }

    #[test]
    fn test_ring_size_validation() {
        assert_eq!(RingSize::new(6.5).unwrap().value(), 6.5);
        assert!(RingSize::new(6.25).is_err());
        assert!(RingSize::new(2.5).is_err());
        assert!(RingSize::new(13.5).is_err());
        assert!(RingSize::new(f32::NAN).is_err());
    }

    #[test]
    fn test_ring_size_serde() {
        let size: RingSize = serde_json::from_str("7.5").unwrap();
        assert_eq!(serde_json::to_string(&size).unwrap(), "7.5");
        assert!(serde_json::from_str::<RingSize>("7.3").is_err());
    }

    #[test]
    fn test_engraving_rules() {
        assert_eq!(
            normalize_engraving("  A & J  ", 20).unwrap().as_deref(),
            Some("A & J")
        );
        assert_eq!(normalize_engraving("   ", 20).unwrap(), None);
        assert!(normalize_engraving("this text is far too long", 20).is_err());
        assert!(normalize_engraving("tab\there", 20).is_err());
        assert!(normalize_engraving("für immer", 9).is_ok());
    }

    #[test]
    fn test_new_snapshot_is_loading() {
        let snapshot = CustomizerSnapshot::new("18k-rose-gold", RotationState::new(36, true));
        assert!(snapshot.is_loading);
        assert!(snapshot.assets.is_none());
        assert!(!snapshot.can_retry());
        assert!(snapshot.current_asset_path().is_none());
    }
}
