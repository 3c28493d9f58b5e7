//! Frame-sequence viewer
//!
//! Shows one image of a pre-rendered rotation sequence, negotiating the image
//! format per frame and warming the neighbouring frames. The viewer is a
//! controlled component: it never stores the current frame itself. Every
//! frame change, whether from a drag, a key or an auto-rotate tick, goes
//! through a [`RotationSink`] (normally the customization controller), and the
//! owner calls [`FrameSequenceViewer::show_frame`] with the result.

pub mod format;
pub mod gesture;
pub mod mock;
pub mod preloader;
pub mod scheduler;

use async_trait::async_trait;
use glam::Vec2;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::CustomizerConfig;
use crate::controller::snapshot::wrap_frame;
use crate::error::{RenderError, Result};
use crate::runtime::AsyncSpawner;
use format::{frame_url, FrameFormat};
use gesture::DragTracker;
use preloader::FramePreloader;
use scheduler::RotationScheduler;

pub use mock::MockImageLoader;

/// Loads (fetches and decodes) one frame image
#[async_trait]
pub trait FrameImageLoader: Send + Sync + 'static {
    async fn load(&self, url: &str) -> Result<()>;
}

/// Owner of the rotation state the viewer drives
pub trait RotationSink: Send + Sync {
    fn current_frame(&self) -> usize;

    fn on_frame_change(&self, frame: usize);

    fn is_auto_rotating(&self) -> bool;

    fn set_auto_rotate(&self, enabled: bool);
}

/// Keys the viewer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKey {
    ArrowLeft,
    ArrowRight,
    Space,
    Home,
    End,
}

/// The image currently on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedFrame {
    pub asset_path: String,
    pub frame: usize,
    pub format: FrameFormat,
    pub url: String,
}

/// Display state of a mounted viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLoadState {
    /// Nothing usable on screen yet
    Loading,

    /// An image is on screen; it may be stale while the next one loads
    Ready(DisplayedFrame),

    /// Every format failed for the requested frame
    Error { asset_path: String, frame: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FrameRequest {
    asset_path: String,
    frame: usize,
}

/// Viewer settings derived from [`CustomizerConfig`]
#[derive(Debug, Clone)]
struct ViewerOptions {
    total_frames: usize,
    formats: Vec<FrameFormat>,
    auto_rotate: bool,
    preload_neighbors: bool,
}

/// Controlled frame-sequence viewer
pub struct FrameSequenceViewer<L: FrameImageLoader, R: AsyncSpawner> {
    options: ViewerOptions,
    loader: Arc<L>,
    spawner: R,
    sink: Arc<dyn RotationSink>,
    state: FrameLoadState,
    pending: Option<FrameRequest>,
    last_request: Option<FrameRequest>,
    drag: DragTracker,
    scheduler: RotationScheduler,
    preloader: FramePreloader,
    announcement: String,
    cancel: CancellationToken,
}

impl<L: FrameImageLoader, R: AsyncSpawner> FrameSequenceViewer<L, R> {
    /// Mount a viewer; must be called within a Tokio runtime
    pub fn mount(
        config: &CustomizerConfig,
        loader: Arc<L>,
        spawner: R,
        sink: Arc<dyn RotationSink>,
    ) -> Self {
        let total_frames = config.total_frames.max(1);
        let tick_sink = Arc::clone(&sink);
        let scheduler = RotationScheduler::spawn(
            config.auto_rotate_interval(),
            config.idle_resume(),
            move || {
                if tick_sink.is_auto_rotating() {
                    let next = (tick_sink.current_frame() + 1) % total_frames;
                    tick_sink.on_frame_change(next);
                }
            },
        );

        let preloader = FramePreloader::default();
        preloader.set_enabled(config.features.preload_neighbors);

        let viewer = Self {
            options: ViewerOptions {
                total_frames,
                formats: config.active_formats().to_vec(),
                auto_rotate: config.features.auto_rotate,
                preload_neighbors: config.features.preload_neighbors,
            },
            loader,
            spawner,
            sink,
            state: FrameLoadState::Loading,
            pending: None,
            last_request: None,
            drag: DragTracker::new(config.drag_sensitivity_px),
            scheduler,
            preloader,
            announcement: String::new(),
            cancel: CancellationToken::new(),
        };
        viewer.sync_auto_rotate();
        viewer
    }

    pub fn state(&self) -> &FrameLoadState {
        &self.state
    }

    /// The image on screen, if any
    pub fn displayed(&self) -> Option<&DisplayedFrame> {
        match &self.state {
            FrameLoadState::Ready(displayed) => Some(displayed),
            _ => None,
        }
    }

    /// True while a frame request has not resolved
    pub fn is_loading(&self) -> bool {
        self.pending.is_some() || self.state == FrameLoadState::Loading
    }

    /// Text for the screen-reader live region
    ///
    /// Follows the requested frame, whether or not its image loaded.
    pub fn announcement(&self) -> &str {
        &self.announcement
    }

    /// The failure to report to the render-mode switcher, if any
    pub fn failure(&self) -> Option<RenderError> {
        match &self.state {
            FrameLoadState::Error { asset_path, frame } => Some(RenderError::Sequence(format!(
                "no format of frame {frame} under {asset_path} could be loaded"
            ))),
            _ => None,
        }
    }

    pub fn preloader(&self) -> &FramePreloader {
        &self.preloader
    }

    pub fn scheduler(&self) -> &RotationScheduler {
        &self.scheduler
    }

    /// Display `frame` of the sequence under `asset_path`
    ///
    /// Formats are tried in order; the first that loads is shown and its
    /// neighbours are warmed. The previous image stays on screen meanwhile.
    pub async fn show_frame(&mut self, asset_path: &str, frame: usize) -> &FrameLoadState {
        let request = FrameRequest {
            asset_path: asset_path.to_string(),
            frame: frame % self.options.total_frames,
        };
        if self.last_request.as_ref() == Some(&request) && self.displayed().is_some() {
            return &self.state;
        }
        self.load(request).await;
        &self.state
    }

    /// Re-attempt the last requested frame
    pub async fn retry(&mut self) -> &FrameLoadState {
        if let Some(request) = self.last_request.clone() {
            log::debug!("Retrying frame {} of {}", request.frame, request.asset_path);
            self.load(request).await;
        }
        &self.state
    }

    async fn load(&mut self, request: FrameRequest) {
        self.announce(request.frame);
        self.last_request = Some(request.clone());
        self.pending = Some(request.clone());
        if self.displayed().is_none() {
            self.state = FrameLoadState::Loading;
        }

        let attempt = attempt_formats(self.loader.as_ref(), &self.options.formats, &request);
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => None,
            outcome = attempt => Some(outcome),
        };
        self.pending = None;

        match outcome {
            None => log::trace!("viewer unmounted while loading frame {}", request.frame),
            Some(Some(displayed)) => {
                self.preloader
                    .mark_warm(&FramePreloader::key(&displayed.asset_path, displayed.frame));
                self.state = FrameLoadState::Ready(displayed);
                self.preload_neighbors(&request);
            }
            Some(None) => {
                log::warn!(
                    "Frame {} of {} failed in every format",
                    request.frame,
                    request.asset_path
                );
                self.state = FrameLoadState::Error {
                    asset_path: request.asset_path,
                    frame: request.frame,
                };
            }
        }
    }

    fn preload_neighbors(&self, request: &FrameRequest) {
        if !self.options.preload_neighbors {
            return;
        }
        for frame in self
            .preloader
            .neighbors(request.frame, self.options.total_frames)
        {
            let key = FramePreloader::key(&request.asset_path, frame);
            if !self.preloader.begin(&key) {
                continue;
            }

            let neighbor = FrameRequest {
                asset_path: request.asset_path.clone(),
                frame,
            };
            let loader = Arc::clone(&self.loader);
            let formats = self.options.formats.clone();
            let preloader = self.preloader.clone();
            let cancel = self.cancel.clone();

            self.spawner.spawn(async move {
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => None,
                    outcome = attempt_formats(loader.as_ref(), &formats, &neighbor) => {
                        Some(outcome)
                    }
                };
                let success = matches!(outcome, Some(Some(_)));
                if !success {
                    log::debug!("Preload of {key} did not complete");
                }
                preloader.finish(&key, success);
            });
        }
    }

    /// Map a key press to a frame change or an auto-rotate toggle
    ///
    /// Returns whether the key was handled.
    pub fn handle_key(&mut self, key: ViewerKey) -> bool {
        let total = self.options.total_frames;
        let current = self.sink.current_frame() as i64;
        match key {
            ViewerKey::ArrowLeft => self.request_frame(wrap_frame(current - 1, total)),
            ViewerKey::ArrowRight => self.request_frame(wrap_frame(current + 1, total)),
            ViewerKey::Home => self.request_frame(0),
            ViewerKey::End => self.request_frame(total - 1),
            ViewerKey::Space => self.toggle_auto_rotate(),
        }
        true
    }

    fn request_frame(&mut self, frame: usize) {
        self.sink.on_frame_change(frame);
        self.announce(frame);
    }

    fn announce(&mut self, frame: usize) {
        self.announcement = format!("Frame {} of {}", frame + 1, self.options.total_frames);
    }

    /// Flip auto-rotation on the sink and follow it with the scheduler
    pub fn toggle_auto_rotate(&self) {
        let enabled = !self.sink.is_auto_rotating();
        self.sink.set_auto_rotate(enabled);
        self.sync_auto_rotate();
    }

    /// Start or stop ticking to match the sink's auto-rotate flag
    pub fn sync_auto_rotate(&self) {
        let wanted = self.options.auto_rotate && self.sink.is_auto_rotating();
        if wanted && !self.scheduler.is_enabled() {
            self.scheduler.start();
        } else if !wanted && self.scheduler.is_enabled() {
            self.scheduler.stop();
        }
    }

    /// Gesture start (mouse down or first touch)
    pub fn pointer_down(&mut self, position: Vec2) {
        self.scheduler.pause();
        self.drag.begin(position);
    }

    /// Gesture move; returns the frame requested from the sink, if any
    pub fn pointer_move(&mut self, position: Vec2) -> Option<usize> {
        let delta = self.drag.update(position)?;
        let current = self.sink.current_frame() as i64;
        let next = wrap_frame(current - delta, self.options.total_frames);
        self.request_frame(next);
        Some(next)
    }

    /// Gesture end; auto-rotation resumes after the idle delay if enabled
    pub fn pointer_up(&mut self) {
        if !self.drag.is_dragging() {
            return;
        }
        self.drag.end();
        if self.options.auto_rotate && self.sink.is_auto_rotating() {
            self.scheduler.resume_after_idle();
        }
    }

    pub fn touch_start(&mut self, touches: &[Vec2]) {
        if let Some(first) = touches.first() {
            self.pointer_down(*first);
        }
    }

    pub fn touch_move(&mut self, touches: &[Vec2]) -> Option<usize> {
        touches.first().and_then(|first| self.pointer_move(*first))
    }

    pub fn touch_end(&mut self) {
        self.pointer_up();
    }

    /// Cancel in-flight loads and preloads and stop all timers
    pub fn unmount(&mut self) {
        self.cancel.cancel();
        self.scheduler.shutdown();
        self.preloader.clear();
        self.drag.end();
    }
}

impl<L: FrameImageLoader, R: AsyncSpawner> Drop for FrameSequenceViewer<L, R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Try each format in order; `None` when all of them fail
async fn attempt_formats<L: FrameImageLoader + ?Sized>(
    loader: &L,
    formats: &[FrameFormat],
    request: &FrameRequest,
) -> Option<DisplayedFrame> {
    for &format in formats {
        let url = frame_url(&request.asset_path, request.frame, format);
        match loader.load(&url).await {
            Ok(()) => {
                return Some(DisplayedFrame {
                    asset_path: request.asset_path.clone(),
                    frame: request.frame,
                    format,
                    url,
                })
            }
            Err(err) => log::debug!("{url} unavailable: {err}"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockSpawner;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        frame: Mutex<usize>,
        auto: Mutex<bool>,
        changes: Mutex<Vec<usize>>,
    }

    impl RotationSink for RecordingSink {
        fn current_frame(&self) -> usize {
            *self.frame.lock()
        }
        fn on_frame_change(&self, frame: usize) {
            *self.frame.lock() = frame;
            self.changes.lock().push(frame);
        }
        fn is_auto_rotating(&self) -> bool {
            *self.auto.lock()
        }
        fn set_auto_rotate(&self, enabled: bool) {
            *self.auto.lock() = enabled;
        }
    }

    fn mount(
        loader: &MockImageLoader,
        sink: &Arc<RecordingSink>,
    ) -> FrameSequenceViewer<MockImageLoader, MockSpawner> {
        let sink: Arc<dyn RotationSink> = Arc::clone(sink) as Arc<dyn RotationSink>;
        FrameSequenceViewer::mount(
            &CustomizerConfig::default(),
            Arc::new(loader.clone()),
            MockSpawner::blocking(),
            sink,
        )
    }

    #[tokio::test]
    async fn test_webp_first() {
        let loader = MockImageLoader::new();
        let sink = Arc::new(RecordingSink::default());
        let mut viewer = mount(&loader, &sink);

        viewer.show_frame("/seq/platinum", 3).await;
        let displayed = viewer.displayed().unwrap();
        assert_eq!(displayed.format, FrameFormat::Webp);
        assert_eq!(displayed.url, "/seq/platinum/3.webp");
        assert_eq!(viewer.announcement(), "Frame 4 of 36");
    }

    #[tokio::test]
    async fn test_avif_fallback() {
        let loader = MockImageLoader::new();
        loader.fail_format(FrameFormat::Webp);
        let sink = Arc::new(RecordingSink::default());
        let mut viewer = mount(&loader, &sink);

        viewer.show_frame("/seq/platinum", 0).await;
        assert_eq!(viewer.displayed().unwrap().format, FrameFormat::Avif);
        assert!(viewer.failure().is_none());
    }

    #[tokio::test]
    async fn test_all_formats_fail_then_retry() {
        let loader = MockImageLoader::new();
        for format in [FrameFormat::Webp, FrameFormat::Avif, FrameFormat::Png] {
            loader.fail_format(format);
        }
        let sink = Arc::new(RecordingSink::default());
        let mut viewer = mount(&loader, &sink);

        let state = viewer.show_frame("/seq/platinum", 5).await.clone();
        assert_eq!(
            state,
            FrameLoadState::Error {
                asset_path: "/seq/platinum".into(),
                frame: 5
            }
        );
        assert!(matches!(viewer.failure(), Some(RenderError::Sequence(_))));

        loader.heal();
        viewer.retry().await;
        assert_eq!(viewer.displayed().unwrap().frame, 5);
    }

    #[tokio::test]
    async fn test_neighbors_preloaded() {
        let loader = MockImageLoader::new();
        let sink = Arc::new(RecordingSink::default());
        let mut viewer = mount(&loader, &sink);

        viewer.show_frame("/seq/platinum", 0).await;
        assert!(loader.was_requested("/seq/platinum/35.webp"));
        assert!(loader.was_requested("/seq/platinum/1.webp"));
        assert!(viewer
            .preloader()
            .is_warm(&FramePreloader::key("/seq/platinum", 35)));
    }

    #[tokio::test]
    async fn test_failed_preload_keeps_current_frame() {
        let loader = MockImageLoader::new();
        loader.fail_url("/seq/platinum/1.webp");
        loader.fail_url("/seq/platinum/1.avif");
        loader.fail_url("/seq/platinum/1.png");
        let sink = Arc::new(RecordingSink::default());
        let mut viewer = mount(&loader, &sink);

        viewer.show_frame("/seq/platinum", 0).await;
        assert_eq!(viewer.displayed().unwrap().frame, 0);
        assert!(!viewer
            .preloader()
            .is_warm(&FramePreloader::key("/seq/platinum", 1)));
    }

    #[tokio::test]
    async fn test_error_replaces_previous_frame() {
        let loader = MockImageLoader::new();
        let sink = Arc::new(RecordingSink::default());
        let mut viewer = mount(&loader, &sink);

        viewer.show_frame("/seq/platinum", 0).await;
        for format in [FrameFormat::Webp, FrameFormat::Avif, FrameFormat::Png] {
            loader.fail_format(format);
        }
        viewer.show_frame("/seq/platinum", 9).await;
        assert!(matches!(viewer.state(), FrameLoadState::Error { frame: 9, .. }));
        assert_eq!(viewer.announcement(), "Frame 10 of 36");
    }

    #[tokio::test]
    async fn test_keyboard_navigation() {
        let loader = MockImageLoader::new();
        let sink = Arc::new(RecordingSink::default());
        let mut viewer = mount(&loader, &sink);

        viewer.handle_key(ViewerKey::ArrowLeft);
        assert_eq!(sink.current_frame(), 35);
        assert_eq!(viewer.announcement(), "Frame 36 of 36");
        viewer.handle_key(ViewerKey::ArrowRight);
        assert_eq!(sink.current_frame(), 0);
        viewer.handle_key(ViewerKey::End);
        assert_eq!(sink.current_frame(), 35);
        viewer.handle_key(ViewerKey::Home);
        assert_eq!(sink.current_frame(), 0);

        viewer.handle_key(ViewerKey::Space);
        assert!(sink.is_auto_rotating());
        assert!(viewer.scheduler().is_enabled());
        viewer.handle_key(ViewerKey::Space);
        assert!(!viewer.scheduler().is_enabled());
    }

    #[tokio::test]
    async fn test_drag_reports_through_sink() {
        let loader = MockImageLoader::new();
        let sink = Arc::new(RecordingSink::default());
        let mut viewer = mount(&loader, &sink);

        viewer.pointer_down(Vec2::new(200.0, 40.0));
        assert_eq!(viewer.pointer_move(Vec2::new(230.0, 40.0)), Some(33));
        assert_eq!(viewer.pointer_move(Vec2::new(205.0, 40.0)), Some(35));
        assert_eq!(viewer.announcement(), "Frame 36 of 36");
        viewer.pointer_up();

        assert_eq!(*sink.changes.lock(), vec![33, 35]);
    }

    #[tokio::test]
    async fn test_touch_uses_first_point() {
        let loader = MockImageLoader::new();
        let sink = Arc::new(RecordingSink::default());
        let mut viewer = mount(&loader, &sink);

        viewer.touch_start(&[Vec2::new(0.0, 0.0), Vec2::new(300.0, 0.0)]);
        assert_eq!(viewer.touch_move(&[Vec2::new(-10.0, 0.0)]), Some(1));
        viewer.touch_end();
    }
}
