//! Device capability detection
//!
//! Classifies the device once per viewer mount into a rendering tier. The
//! probe never fails: anything that goes wrong while inspecting the
//! environment yields [`DeviceCapabilities::safe_default`].

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::error::{CustomizerError, Result};

/// Coarse rendering-power class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceTier {
    Low,
    Mid,
    High,
}

/// Result of one capability probe; immutable for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub tier: DeviceTier,
    pub is_desktop: bool,
    /// A WebGL context could be created
    pub webgl: bool,
    pub ar_ready: bool,
}

impl DeviceCapabilities {
    /// Low tier, not AR-ready, frame sequences only
    pub const fn safe_default() -> Self {
        Self {
            tier: DeviceTier::Low,
            is_desktop: false,
            webgl: false,
            ar_ready: false,
        }
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self::safe_default()
    }
}

/// Outcome of the optional WebGL feature probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuProbe {
    pub webgl2: bool,
    pub max_texture_size: u32,
}

/// What the host environment can report about the device
pub trait DeviceEnvironment: Send + Sync {
    fn viewport_width(&self) -> Result<u32>;

    fn max_touch_points(&self) -> Result<u32>;

    /// A precise pointer (mouse or trackpad) is the primary input
    fn has_fine_pointer(&self) -> bool;

    /// Cheap WebGL probe; `None` when no context can be created
    fn probe_gpu(&self) -> Result<Option<GpuProbe>>;

    fn hardware_concurrency(&self) -> Option<u32> {
        None
    }

    fn supports_ar(&self) -> bool {
        false
    }
}

/// Viewports at least this wide count as desktop
pub const DESKTOP_MIN_WIDTH: u32 = 1024;

/// One-shot capability probe with a cached result
pub struct DeviceCapabilityProbe<E: DeviceEnvironment> {
    env: E,
    detected: OnceCell<DeviceCapabilities>,
}

impl<E: DeviceEnvironment> DeviceCapabilityProbe<E> {
    pub fn new(env: E) -> Self {
        Self {
            env,
            detected: OnceCell::new(),
        }
    }

    /// Classify the device; later calls return the first answer
    pub async fn detect(&self) -> DeviceCapabilities {
        *self
            .detected
            .get_or_init(|| async {
                classify(&self.env).unwrap_or_else(|err| {
                    log::debug!("Capability probe failed, using safe default: {err}");
                    DeviceCapabilities::safe_default()
                })
            })
            .await
    }

    /// The cached answer, if `detect` already ran
    pub fn cached(&self) -> Option<DeviceCapabilities> {
        self.detected.get().copied()
    }
}

fn classify<E: DeviceEnvironment>(env: &E) -> Result<DeviceCapabilities> {
    let width = env.viewport_width()?;
    if width == 0 {
        return Err(CustomizerError::DeviceProbe("viewport has zero width".to_string()));
    }
    let touch_points = env.max_touch_points()?;
    let is_desktop = width >= DESKTOP_MIN_WIDTH && (touch_points == 0 || env.has_fine_pointer());

    let gpu = env.probe_gpu()?;
    let cores = env.hardware_concurrency().unwrap_or(2);

    let tier = match gpu {
        None => DeviceTier::Low,
        Some(probe)
            if probe.webgl2 && probe.max_texture_size >= 4096 && cores >= 8 && is_desktop =>
        {
            DeviceTier::High
        }
        Some(_) if cores >= 4 => DeviceTier::Mid,
        Some(_) => DeviceTier::Low,
    };

    Ok(DeviceCapabilities {
        tier,
        is_desktop,
        webgl: gpu.is_some(),
        ar_ready: env.supports_ar() && !is_desktop,
    })
}

/// Fixed environment description, for tests and server-side rendering
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    pub viewport_width: u32,
    pub max_touch_points: u32,
    pub fine_pointer: bool,
    pub gpu: Option<GpuProbe>,
    pub cores: Option<u32>,
    pub ar: bool,
    /// Make every query fail
    pub broken: bool,
}

impl StaticEnvironment {
    /// A well-equipped desktop browser
    pub fn desktop_workstation() -> Self {
        Self {
            viewport_width: 1920,
            max_touch_points: 0,
            fine_pointer: true,
            gpu: Some(GpuProbe {
                webgl2: true,
                max_texture_size: 16384,
            }),
            cores: Some(12),
            ar: false,
            broken: false,
        }
    }

    /// A mid-range phone
    pub fn phone() -> Self {
        Self {
            viewport_width: 390,
            max_touch_points: 5,
            fine_pointer: false,
            gpu: Some(GpuProbe {
                webgl2: true,
                max_texture_size: 4096,
            }),
            cores: Some(6),
            ar: true,
            broken: false,
        }
    }

    fn check(&self) -> Result<()> {
        if self.broken {
            return Err(CustomizerError::DeviceProbe("environment unavailable".to_string()));
        }
        Ok(())
    }
}

impl DeviceEnvironment for StaticEnvironment {
    fn viewport_width(&self) -> Result<u32> {
        self.check()?;
        Ok(self.viewport_width)
    }

    fn max_touch_points(&self) -> Result<u32> {
        self.check()?;
        Ok(self.max_touch_points)
    }

    fn has_fine_pointer(&self) -> bool {
        self.fine_pointer
    }

    fn probe_gpu(&self) -> Result<Option<GpuProbe>> {
        self.check()?;
        Ok(self.gpu)
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        self.cores
    }

    fn supports_ar(&self) -> bool {
        self.ar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_desktop_workstation_is_high() {
        let probe = DeviceCapabilityProbe::new(StaticEnvironment::desktop_workstation());
        let caps = probe.detect().await;
        assert_eq!(caps.tier, DeviceTier::High);
        assert!(caps.is_desktop);
        assert!(!caps.ar_ready);
    }

    #[tokio::test]
    async fn test_phone_is_mid_and_ar_ready() {
        let probe = DeviceCapabilityProbe::new(StaticEnvironment::phone());
        let caps = probe.detect().await;
        assert_eq!(caps.tier, DeviceTier::Mid);
        assert!(!caps.is_desktop);
        assert!(caps.ar_ready);
    }

    #[tokio::test]
    async fn test_no_webgl_is_low() {
        let env = StaticEnvironment {
            gpu: None,
            ..StaticEnvironment::desktop_workstation()
        };
        let caps = DeviceCapabilityProbe::new(env).detect().await;
        assert_eq!(caps.tier, DeviceTier::Low);
        assert!(!caps.webgl);
    }

    #[tokio::test]
    async fn test_failure_yields_safe_default() {
        let env = StaticEnvironment {
            broken: true,
            ..StaticEnvironment::desktop_workstation()
        };
        let caps = DeviceCapabilityProbe::new(env).detect().await;
        assert_eq!(caps, DeviceCapabilities::safe_default());
    }

    struct CountingEnv(AtomicUsize);

    impl DeviceEnvironment for CountingEnv {
        fn viewport_width(&self) -> Result<u32> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(1280)
        }
        fn max_touch_points(&self) -> Result<u32> {
            Ok(0)
        }
        fn has_fine_pointer(&self) -> bool {
            true
        }
        fn probe_gpu(&self) -> Result<Option<GpuProbe>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_detect_runs_once() {
        let probe = DeviceCapabilityProbe::new(CountingEnv(AtomicUsize::new(0)));
        assert!(probe.cached().is_none());

        let first = probe.detect().await;
        let second = probe.detect().await;

        assert_eq!(first, second);
        assert_eq!(probe.env.0.load(Ordering::SeqCst), 1);
    }
}
