//! Error types for jewel_customizer

use thiserror::Error;

/// Main error type for customizer operations
///
/// Every variant carries owned strings so the error can be cloned into the
/// snapshot and shared between callers awaiting the same coalesced fetch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CustomizerError {
    /// Transport failure or non-2xx response from the asset endpoint
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint answered but has no usable assets for this material
    #[error("Assets unavailable for {material_id}: {message}")]
    AssetsUnavailable {
        material_id: String,
        message: String,
    },

    /// The active viewer tier failed at runtime
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Capability detection failed; always absorbed into a safe default
    #[error("Device probe failed: {0}")]
    DeviceProbe(String),

    #[error("Unknown material: {0}")]
    UnknownMaterial(String),

    #[error("Unknown stone quality: {0}")]
    UnknownStoneQuality(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The cart collaborator rejected the request
    #[error("Cart rejected the customization: {message}")]
    Cart { message: String, retryable: bool },

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Operation was cancelled")]
    Cancelled,
}

impl CustomizerError {
    /// Whether the UI should offer a retry affordance for this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::AssetsUnavailable { .. } | Self::Decode(_) => true,
            Self::Cart { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CustomizerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Failure raised by an active renderer tier
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Model failed to load: {0}")]
    ModelLoad(String),

    #[error("GPU context lost")]
    ContextLost,

    #[error("Frame sequence failed: {0}")]
    Sequence(String),

    #[error("Static image failed: {0}")]
    StaticImage(String),
}

/// Result type alias for customizer operations
pub type Result<T> = std::result::Result<T, CustomizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CustomizerError::Network("timeout".into()).is_retryable());
        assert!(CustomizerError::AssetsUnavailable {
            material_id: "platinum".into(),
            message: "not generated".into(),
        }
        .is_retryable());
        assert!(!CustomizerError::UnknownMaterial("tin".into()).is_retryable());
        assert!(CustomizerError::Cart {
            message: "busy".into(),
            retryable: true
        }
        .is_retryable());
    }

    #[test]
    fn test_render_error_conversion() {
        let err: CustomizerError = RenderError::ContextLost.into();
        assert_eq!(err.to_string(), "Render error: GPU context lost");
    }
}
