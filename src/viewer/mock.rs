//! Mock frame image loader for testing

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use super::format::FrameFormat;
use super::FrameImageLoader;
use crate::error::{CustomizerError, Result};

#[derive(Debug, Default)]
struct MockImageState {
    failing_formats: HashSet<FrameFormat>,
    failing_urls: HashSet<String>,
    requests: Vec<String>,
}

/// Image loader that succeeds unless told otherwise, recording every URL
#[derive(Clone, Debug, Default)]
pub struct MockImageLoader {
    state: Arc<RwLock<MockImageState>>,
}

impl MockImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer 404 for every URL with this format's extension
    pub fn fail_format(&self, format: FrameFormat) {
        self.state.write().failing_formats.insert(format);
    }

    /// Answer 404 for one exact URL
    pub fn fail_url(&self, url: &str) {
        self.state.write().failing_urls.insert(url.to_string());
    }

    /// Stop failing anything
    pub fn heal(&self) {
        let mut state = self.state.write();
        state.failing_formats.clear();
        state.failing_urls.clear();
    }

    /// Every URL requested, in order
    pub fn requests(&self) -> Vec<String> {
        self.state.read().requests.clone()
    }

    pub fn was_requested(&self, url: &str) -> bool {
        self.state.read().requests.iter().any(|r| r == url)
    }
}

#[async_trait]
impl FrameImageLoader for MockImageLoader {
    async fn load(&self, url: &str) -> Result<()> {
        let mut state = self.state.write();
        state.requests.push(url.to_string());

        let format_fails = state
            .failing_formats
            .iter()
            .any(|f| url.ends_with(&format!(".{}", f.extension())));
        if format_fails || state.failing_urls.contains(url) {
            return Err(CustomizerError::Network(format!("404 {url}")));
        }
        Ok(())
    }
}
