//! Frame image formats and resource naming

use serde::{Deserialize, Serialize};
use std::fmt;

/// Encodings a frame image may be published in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// Smallest files, broadest modern support
    Webp,
    Avif,
    /// Always published; the last resort
    Png,
}

impl FrameFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// `{asset_path}/{frame}.{ext}`; zero-based index without padding
pub fn frame_url(asset_path: &str, frame: usize, format: FrameFormat) -> String {
    format!(
        "{}/{}.{}",
        asset_path.trim_end_matches('/'),
        frame,
        format.extension()
    )
}
