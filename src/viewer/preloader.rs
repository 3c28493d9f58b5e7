//! Neighbour-frame preloading
//!
//! Keeps track of which frame images are warm or being warmed so that the
//! viewer never issues the same preload twice.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Book-keeping for background frame preloads
#[derive(Debug, Clone)]
pub struct FramePreloader {
    /// Frame keys currently being fetched
    loading: Arc<Mutex<HashSet<String>>>,
    /// Frame keys known to be in the browser's image cache
    warm: Arc<Mutex<HashSet<String>>>,
    /// How many frames on each side of the current one to warm
    radius: usize,
    enabled: Arc<AtomicBool>,
}

impl Default for FramePreloader {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FramePreloader {
    pub fn new(radius: usize) -> Self {
        Self {
            loading: Arc::new(Mutex::new(HashSet::new())),
            warm: Arc::new(Mutex::new(HashSet::new())),
            radius,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Key identifying one frame of one sequence
    pub fn key(asset_path: &str, frame: usize) -> String {
        format!("{asset_path}#{frame}")
    }

    /// Enable or disable preloading
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Frames to warm around `frame`, nearest first, wrapping at both ends
    pub fn neighbors(&self, frame: usize, total_frames: usize) -> Vec<usize> {
        if total_frames <= 1 {
            return Vec::new();
        }
        let mut frames = Vec::with_capacity(self.radius * 2);
        for offset in 1..=self.radius {
            let before = (frame + total_frames - offset % total_frames) % total_frames;
            let after = (frame + offset) % total_frames;
            for candidate in [before, after] {
                if candidate != frame && !frames.contains(&candidate) {
                    frames.push(candidate);
                }
            }
        }
        frames
    }

    /// Claim a frame for preloading; false if it is warm or already claimed
    pub fn begin(&self, key: &str) -> bool {
        if !self.is_enabled() || self.warm.lock().contains(key) {
            return false;
        }
        self.loading.lock().insert(key.to_string())
    }

    /// Release a claim, remembering the frame as warm on success
    pub fn finish(&self, key: &str, success: bool) {
        self.loading.lock().remove(key);
        if success {
            self.warm.lock().insert(key.to_string());
        }
    }

    /// Record a frame that was displayed (and is therefore warm)
    pub fn mark_warm(&self, key: &str) {
        self.warm.lock().insert(key.to_string());
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.loading.lock().contains(key)
    }

    pub fn is_warm(&self, key: &str) -> bool {
        self.warm.lock().contains(key)
    }

    /// Forget everything, e.g. on unmount
    pub fn clear(&self) {
        self.loading.lock().clear();
        self.warm.lock().clear();
    }
}
