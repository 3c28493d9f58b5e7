//! Render-mode selection and fallback
//!
//! The switcher picks which preview tier is mounted: frame sequences, the GPU
//! model viewer, a static image, or AR. Runtime failures only ever move it
//! down the ladder; moving up takes an explicit request. The switcher holds no
//! customization state, so changing modes never disturbs the controller or the
//! asset cache.

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

use crate::catalog::{MaterialOption, PbrHints};
use crate::device::{DeviceCapabilities, DeviceTier};
use crate::error::{CustomizerError, RenderError, Result};

pub use mock::{MockModel, MockRenderer};

/// Message shown once every tier has failed
pub const PREVIEW_UNAVAILABLE: &str = "Preview unavailable";

/// Preview tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Sequences,
    Gpu3d,
    StaticImage,
    Ar,
}

impl RenderMode {
    /// The tier to fall back to after a failure, if any
    pub fn downgrade(self) -> Option<RenderMode> {
        match self {
            Self::Gpu3d | Self::Ar => Some(Self::Sequences),
            Self::Sequences => Some(Self::StaticImage),
            Self::StaticImage => None,
        }
    }

    /// Whether `error` comes from the renderer backing this tier
    pub fn raised(self, error: &RenderError) -> bool {
        match error {
            RenderError::ModelLoad(_) | RenderError::ContextLost => {
                matches!(self, Self::Gpu3d | Self::Ar)
            }
            RenderError::Sequence(_) => self == Self::Sequences,
            RenderError::StaticImage(_) => self == Self::StaticImage,
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sequences => "sequences",
            Self::Gpu3d => "gpu3d",
            Self::StaticImage => "static image",
            Self::Ar => "ar",
        };
        f.write_str(name)
    }
}

/// Narrow interface to a GPU model viewer
///
/// # Example
/// ```ignore
/// let renderer = MockRenderer::new();
/// let model = renderer.load_model("/models/ring-001.glb").await?;
/// renderer.apply_material(&model, &platinum.pbr)?;
/// ```
#[async_trait]
pub trait ModelRenderer: Send + Sync + Debug {
    /// Loaded model handle for this backend
    type Model: Clone + Send + Sync + Debug;

    async fn load_model(&self, path: &str) -> std::result::Result<Self::Model, RenderError>;

    fn apply_material(
        &self,
        model: &Self::Model,
        hints: &PbrHints,
    ) -> std::result::Result<(), RenderError>;

    /// Name of this backend (for debugging)
    fn renderer_name(&self) -> &'static str;
}

/// Chooses and downgrades the preview tier
#[derive(Debug, Clone)]
pub struct RenderModeSwitcher {
    capabilities: DeviceCapabilities,
    model_path: Option<String>,
    ar_enabled: bool,
    mode: RenderMode,
    exhausted: bool,
    transitioning: bool,
}

impl RenderModeSwitcher {
    /// Pick the initial tier: GPU on high-tier desktops with a model, else sequences
    pub fn new(
        capabilities: DeviceCapabilities,
        model_path: Option<String>,
        ar_enabled: bool,
    ) -> Self {
        let mode = if capabilities.tier == DeviceTier::High
            && capabilities.is_desktop
            && model_path.is_some()
        {
            RenderMode::Gpu3d
        } else {
            RenderMode::Sequences
        };
        log::debug!("Initial render mode {mode} for {:?} device", capabilities.tier);

        Self {
            capabilities,
            model_path,
            ar_enabled,
            mode,
            exhausted: false,
            transitioning: false,
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    /// True once even the static image failed
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Placeholder text to show instead of any preview
    pub fn placeholder(&self) -> Option<&'static str> {
        self.exhausted.then_some(PREVIEW_UNAVAILABLE)
    }

    /// Whether the manual mode toggle should be shown
    pub fn can_toggle(&self) -> bool {
        self.capabilities.tier != DeviceTier::Low && self.model_path.is_some()
    }

    pub fn is_viable(&self, mode: RenderMode) -> bool {
        match mode {
            RenderMode::Sequences | RenderMode::StaticImage => true,
            RenderMode::Gpu3d => self.can_toggle(),
            RenderMode::Ar => {
                self.ar_enabled && self.capabilities.ar_ready && self.model_path.is_some()
            }
        }
    }

    /// Modes a user may pick, richest first
    pub fn available_modes(&self) -> Vec<RenderMode> {
        [
            RenderMode::Ar,
            RenderMode::Gpu3d,
            RenderMode::Sequences,
            RenderMode::StaticImage,
        ]
        .into_iter()
        .filter(|mode| self.is_viable(*mode))
        .collect()
    }

    /// Handle a runtime failure of the active tier
    ///
    /// Returns the tier now active. Errors from a tier that is no longer
    /// mounted are ignored. When no tier remains the mode stays on the static
    /// image and [`placeholder`](Self::placeholder) becomes set.
    pub fn report_error(&mut self, error: &RenderError) -> RenderMode {
        if !self.mode.raised(error) {
            log::debug!("Ignoring late error from an inactive tier: {error}");
            return self.mode;
        }
        match self.mode.downgrade() {
            Some(next) => {
                log::warn!("{} renderer failed ({error}); falling back to {next}", self.mode);
                self.mode = next;
                self.transitioning = true;
            }
            None => {
                log::error!("Every preview tier failed; last error: {error}");
                self.exhausted = true;
            }
        }
        self.mode
    }

    /// Explicit user request for a tier
    pub fn request_mode(&mut self, mode: RenderMode) -> Result<RenderMode> {
        if !self.is_viable(mode) {
            return Err(CustomizerError::InvalidOption(format!(
                "render mode {mode} is not available on this device"
            )));
        }
        if mode != self.mode || self.exhausted {
            log::debug!("Switching render mode {} -> {mode}", self.mode);
            self.mode = mode;
            self.exhausted = false;
            self.transitioning = true;
        }
        Ok(self.mode)
    }

    /// Whether the transition overlay is up
    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    /// The new tier has drawn its first image
    pub fn finish_transition(&mut self) {
        self.transitioning = false;
    }

    /// Load the model and apply the material on a GPU tier
    ///
    /// Any failure downgrades the switcher before the error is returned.
    pub async fn activate_gpu<M: ModelRenderer>(
        &mut self,
        renderer: &M,
        material: &MaterialOption,
    ) -> std::result::Result<M::Model, RenderError> {
        let outcome = match self.model_path.clone() {
            Some(path) => match renderer.load_model(&path).await {
                Ok(model) => renderer
                    .apply_material(&model, &material.pbr)
                    .map(|()| model),
                Err(err) => Err(err),
            },
            None => Err(RenderError::ModelLoad("no model path for this product".to_string())),
        };

        match outcome {
            Ok(model) => {
                log::debug!(
                    "{} showing {} with {}",
                    renderer.renderer_name(),
                    self.mode,
                    material.id
                );
                Ok(model)
            }
            Err(err) => {
                self.report_error(&err);
                Err(err)
            }
        }
    }

    /// Re-apply PBR hints after a material change on an active GPU tier
    pub fn apply_material<M: ModelRenderer>(
        &mut self,
        renderer: &M,
        model: &M::Model,
        material: &MaterialOption,
    ) -> std::result::Result<(), RenderError> {
        let result = renderer.apply_material(model, &material.pbr);
        if let Err(err) = &result {
            self.report_error(err);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(tier: DeviceTier, is_desktop: bool) -> DeviceCapabilities {
        DeviceCapabilities {
            tier,
            is_desktop,
            webgl: tier != DeviceTier::Low,
            ar_ready: !is_desktop,
        }
    }

    #[test]
    fn test_initial_mode() {
        let model = Some("/models/ring-001.glb".to_string());
        assert_eq!(
            RenderModeSwitcher::new(caps(DeviceTier::High, true), model.clone(), false).mode(),
            RenderMode::Gpu3d
        );
        assert_eq!(
            RenderModeSwitcher::new(caps(DeviceTier::High, true), None, false).mode(),
            RenderMode::Sequences
        );
        assert_eq!(
            RenderModeSwitcher::new(caps(DeviceTier::Mid, false), model, false).mode(),
            RenderMode::Sequences
        );
    }

    #[test]
    fn test_downgrade_ladder() {
        let mut switcher = RenderModeSwitcher::new(
            caps(DeviceTier::High, true),
            Some("/models/ring-001.glb".into()),
            false,
        );
        assert_eq!(switcher.report_error(&RenderError::ContextLost), RenderMode::Sequences);
        assert!(switcher.is_transitioning());
        switcher.finish_transition();

        let err = RenderError::Sequence("all formats failed".into());
        assert_eq!(switcher.report_error(&err), RenderMode::StaticImage);
        assert!(switcher.placeholder().is_none());

        let err = RenderError::StaticImage("404".into());
        assert_eq!(switcher.report_error(&err), RenderMode::StaticImage);
        assert_eq!(switcher.placeholder(), Some(PREVIEW_UNAVAILABLE));
    }

    #[test]
    fn test_late_error_from_inactive_tier_ignored() {
        let mut switcher = RenderModeSwitcher::new(
            caps(DeviceTier::High, true),
            Some("/models/ring-001.glb".into()),
            false,
        );
        let failed = RenderError::ModelLoad("404".into());
        assert_eq!(switcher.report_error(&failed), RenderMode::Sequences);
        assert_eq!(switcher.report_error(&RenderError::ContextLost), RenderMode::Sequences);
        assert_eq!(
            switcher.report_error(&RenderError::StaticImage("404".into())),
            RenderMode::Sequences
        );
        assert!(switcher.placeholder().is_none());
    }

    #[test]
    fn test_error_ownership() {
        assert!(RenderMode::Ar.raised(&RenderError::ContextLost));
        assert!(!RenderMode::Sequences.raised(&RenderError::ContextLost));
        assert!(RenderMode::Sequences.raised(&RenderError::Sequence("gone".into())));
    }

    #[test]
    fn test_low_tier_cannot_toggle() {
        let mut switcher = RenderModeSwitcher::new(
            caps(DeviceTier::Low, false),
            Some("/models/ring-001.glb".into()),
            false,
        );
        assert!(!switcher.can_toggle());
        assert!(switcher.request_mode(RenderMode::Gpu3d).is_err());
        assert_eq!(
            switcher.available_modes(),
            vec![RenderMode::Sequences, RenderMode::StaticImage]
        );
    }

    #[test]
    fn test_ar_requires_flag_and_readiness() {
        let model = Some("/models/ring-001.glb".to_string());
        let without_flag =
            RenderModeSwitcher::new(caps(DeviceTier::Mid, false), model.clone(), false);
        assert!(!without_flag.is_viable(RenderMode::Ar));

        let with_flag = RenderModeSwitcher::new(caps(DeviceTier::Mid, false), model, true);
        assert_eq!(with_flag.available_modes()[0], RenderMode::Ar);
    }
}
