//! Walkthrough: mount a customizer, switch materials, rotate the preview
//!
//! Run with `cargo run --example walkthrough`. Set `RUST_LOG=trace` for the
//! scheduler and preload chatter.

use glam::Vec2;
use jewel_customizer::device::StaticEnvironment;
use jewel_customizer::{
    AssetCache, CustomizationController, CustomizerConfig, CustomizerEvent, DeviceCapabilityProbe,
    FrameSequenceViewer, MockAssetSource, MockImageLoader, RenderModeSwitcher, RotationSink,
    TokioSpawner,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let config = CustomizerConfig::from_toml_str(
        r#"
        total_frames = 36
        auto_rotate_interval_ms = 100

        [features]
        preload_neighbors = true
        "#,
    )?;

    let caps = DeviceCapabilityProbe::new(StaticEnvironment::phone())
        .detect()
        .await;
    let switcher = RenderModeSwitcher::new(caps, None, config.features.ar);
    log::info!("Device tier {:?}, rendering with {}", caps.tier, switcher.mode());

    let source = MockAssetSource::default().with_default_delay(Duration::from_millis(80));
    let cache = AssetCache::new(source, config.max_concurrent_fetches);
    let controller = CustomizationController::builder("ring-001", cache, TokioSpawner::new())
        .config(config.clone())
        .initial_material("18k-rose-gold")
        .mount()?;
    controller.add_observer(Arc::new(|event: &CustomizerEvent| {
        if let CustomizerEvent::PriceChanged(quote) = event {
            log::info!(
                "Price for {}: ${:.2}",
                quote.material_id,
                quote.total_cents as f64 / 100.0
            );
        }
    }));

    controller.initialize().await?;
    controller.prefetch_settled().await;

    let sink: Arc<dyn RotationSink> = Arc::new(controller.clone());
    let mut viewer = FrameSequenceViewer::mount(
        &config,
        Arc::new(MockImageLoader::new()),
        TokioSpawner::new(),
        sink,
    );

    controller.change_material("platinum").await?;
    controller.select_stone_quality(Some("excellent"))?;

    tokio::time::sleep(Duration::from_millis(450)).await;
    let snapshot = controller.snapshot();
    if let Some(path) = snapshot.current_asset_path() {
        viewer.show_frame(path, snapshot.rotation.current_frame).await;
        log::info!("{}", viewer.announcement());
    }

    viewer.pointer_down(Vec2::new(200.0, 100.0));
    viewer.pointer_move(Vec2::new(140.0, 100.0));
    viewer.pointer_up();
    log::info!(
        "After drag the preview shows frame {}",
        controller.snapshot().rotation.current_frame
    );

    viewer.unmount();
    controller.unmount();
    Ok(())
}
