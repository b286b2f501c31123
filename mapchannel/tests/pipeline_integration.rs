//! Integration tests for the map channel pipeline.
//!
//! These tests drive complete passes through the public API:
//! - Static image → threshold → composite → receiver
//! - Window changes superseding a slow pass
//! - Retries against a temporarily unavailable source
//! - Failure reporting into an offscreen view
//! - Live settings changes and session files
//!
//! Run with: `cargo test --test pipeline_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, GrayImage, Luma};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::runtime::Handle;

use mapchannel::app::{AppConfig, MapApp};
use mapchannel::channel::{ChannelConfig, MapChannel, MapChannelReceiver, MapUpdate, PassOutcome};
use mapchannel::composite::SingleComposite;
use mapchannel::geo::{GeoRect, GeoRequest, Projection};
use mapchannel::pipeline::{Pipeline, PipelineError, RetryPolicy};
use mapchannel::raster::{MapAttr, MapData};
use mapchannel::settings::{SessionConfig, ThresholdSettings};
use mapchannel::source::{MapSource, StaticImageMapSource};
use mapchannel::stage::ThresholdStage;
use mapchannel::view::OffscreenView;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Default)]
struct Recorder {
    updates: Mutex<Vec<MapUpdate>>,
}

impl Recorder {
    fn updates(&self) -> Vec<MapUpdate> {
        self.updates.lock().clone()
    }
}

impl MapChannelReceiver for Recorder {
    fn map_changed(&self, update: MapUpdate) {
        self.updates.lock().push(update);
    }
}

/// 8x4 gray globe: one value per 45x45 degree block.
fn globe_values() -> [[u8; 8]; 4] {
    [
        [0, 40, 80, 120, 127, 128, 129, 255],
        [255, 200, 10, 128, 0, 130, 90, 60],
        [128, 128, 128, 128, 127, 127, 127, 127],
        [1, 2, 3, 4, 250, 251, 252, 253],
    ]
}

fn globe_image() -> DynamicImage {
    let values = globe_values();
    DynamicImage::ImageLuma8(GrayImage::from_fn(8, 4, |x, y| {
        Luma([values[y as usize][x as usize]])
    }))
}

fn globe_request(ppd: f64) -> GeoRequest {
    GeoRequest::new(
        GeoRect::new(0.0, -90.0, 360.0, 180.0),
        ppd,
        Projection::Equirectangular,
    )
    .unwrap()
}

fn window(min_x: f64) -> GeoRequest {
    GeoRequest::new(
        GeoRect::new(min_x, -10.0, 20.0, 20.0),
        1.0,
        Projection::Equirectangular,
    )
    .unwrap()
}

fn threshold_pipeline(source: Arc<dyn MapSource>, settings: Arc<ThresholdSettings>) -> Pipeline {
    Pipeline::build(
        source,
        vec![Arc::new(ThresholdStage::new(settings))],
        Arc::new(SingleComposite::new()),
    )
    .unwrap()
}

fn channel_with(receiver: Arc<dyn MapChannelReceiver>, retry: RetryPolicy) -> Arc<MapChannel> {
    MapChannel::new(
        Handle::current(),
        ChannelConfig::new().with_retry_policy(retry),
        receiver,
    )
}

fn fast_retries(attempts: u32) -> RetryPolicy {
    RetryPolicy::Fixed {
        max_attempts: attempts,
        delay: Duration::from_millis(5),
    }
}

/// Source that blocks for a while on windows west of 100E.
struct SlowSource {
    delay: Duration,
}

impl MapSource for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    fn map_attr(&self) -> MapAttr {
        MapAttr::Gray
    }

    fn max_ppd(&self) -> f64 {
        1.0
    }

    fn fetch_tile(&self, request: &GeoRequest) -> Result<MapData, PipelineError> {
        if request.extent().min_x < 100.0 {
            std::thread::sleep(self.delay);
        }
        let image = GrayImage::from_pixel(request.width_px(), request.height_px(), Luma([200]));
        MapData::new(DynamicImage::ImageLuma8(image), *request)
    }
}

/// Source that fails with a retryable or permanent error a number of times.
struct FailingSource {
    failures: AtomicUsize,
    retryable: bool,
    calls: AtomicUsize,
}

impl FailingSource {
    fn new(failures: usize, retryable: bool) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            retryable,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MapSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    fn map_attr(&self) -> MapAttr {
        MapAttr::Gray
    }

    fn max_ppd(&self) -> f64 {
        1.0
    }

    fn fetch_tile(&self, request: &GeoRequest) -> Result<MapData, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(if self.retryable {
                PipelineError::unavailable("failing", "server busy")
            } else {
                PipelineError::source_failed("failing", "bad layer")
            });
        }
        let image = GrayImage::from_pixel(request.width_px(), request.height_px(), Luma([10]));
        MapData::new(DynamicImage::ImageLuma8(image), *request)
    }
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_threshold_over_static_globe() {
    let recorder = Arc::new(Recorder::default());
    let channel = channel_with(recorder.clone(), RetryPolicy::None);

    let source = Arc::new(StaticImageMapSource::new("globe", globe_image()));
    let settings = Arc::new(ThresholdSettings::default());
    channel
        .set_pipelines(vec![threshold_pipeline(source, settings)])
        .unwrap();

    let request = globe_request(1.0);
    let outcome = channel.set_map_window(request).wait().await;
    assert_eq!(outcome, PassOutcome::Delivered);

    let updates = recorder.updates();
    assert_eq!(updates.len(), 1);
    let MapUpdate::Ready(result) = &updates[0] else {
        panic!("expected a result, got {:?}", updates[0]);
    };
    assert_eq!(result.data.attr(), MapAttr::GrayAlpha);
    assert!(result.changed.is_full_for(&request));

    let out = result.data.image().to_luma_alpha8();
    assert_eq!(out.dimensions(), (360, 180));

    let values = globe_values();
    for (row, pixel_row) in (0..180u32).step_by(9).map(|r| (r, r / 45)) {
        for col in (0..360u32).step_by(9) {
            let expected = if values[pixel_row as usize][(col / 45) as usize] >= 128 {
                255
            } else {
                0
            };
            let pixel = out.get_pixel(col, row).0;
            assert_eq!(pixel, [expected, 255], "pixel ({}, {})", col, row);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_window_supersedes_slow_pass() {
    let recorder = Arc::new(Recorder::default());
    let channel = channel_with(recorder.clone(), RetryPolicy::None);
    let source = Arc::new(SlowSource {
        delay: Duration::from_millis(300),
    });
    channel
        .set_pipelines(vec![threshold_pipeline(source, Arc::default())])
        .unwrap();

    let first = channel.set_map_window(window(0.0));
    let second = channel.set_map_window(window(200.0));

    assert_eq!(second.wait().await, PassOutcome::Delivered);
    assert_ne!(first.wait().await, PassOutcome::Delivered);
    channel.flush().await;

    let updates = recorder.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(*updates[0].request(), window(200.0));
    assert_eq!(updates[0].generation(), channel.generation());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retry_until_source_recovers() {
    let recorder = Arc::new(Recorder::default());
    let channel = channel_with(recorder.clone(), fast_retries(4));
    let source = Arc::new(FailingSource::new(2, true));
    channel
        .set_pipelines(vec![threshold_pipeline(source.clone(), Arc::default())])
        .unwrap();

    let outcome = channel.set_map_window(window(0.0)).wait().await;

    assert_eq!(outcome, PassOutcome::Delivered);
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    assert!(matches!(recorder.updates()[0], MapUpdate::Ready(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failure_keeps_view_content() {
    let request = window(0.0);
    let view = Arc::new(OffscreenView::new(request));
    let channel = channel_with(view.clone(), RetryPolicy::None);

    let good = Arc::new(SlowSource {
        delay: Duration::ZERO,
    });
    channel
        .set_pipelines(vec![threshold_pipeline(good, Arc::default())])
        .unwrap();
    assert_eq!(
        channel.set_map_window(request).wait().await,
        PassOutcome::Delivered
    );
    let painted = view.snapshot();
    assert_eq!(painted.get_pixel(5, 5).0, [255, 255, 255, 255]);

    let bad = Arc::new(FailingSource::new(usize::MAX, false));
    let outcome = channel
        .set_pipelines(vec![threshold_pipeline(bad, Arc::default())])
        .unwrap()
        .wait()
        .await;

    assert!(matches!(outcome, PassOutcome::Failed(PipelineError::SourceFailed { .. })));
    assert_eq!(view.snapshot(), painted);
    assert_eq!(view.redraw_count(), 1);
    assert!(view.last_error().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_threshold_change_reprocesses_once() {
    let recorder = Arc::new(Recorder::default());
    let channel = channel_with(recorder.clone(), RetryPolicy::None);
    let settings = Arc::new(ThresholdSettings::default());
    let source = Arc::new(SlowSource {
        delay: Duration::ZERO,
    });
    channel
        .set_pipelines(vec![threshold_pipeline(source, settings.clone())])
        .unwrap();
    channel.set_map_window(window(0.0)).wait().await;
    let before = channel.generation();

    assert!(settings.set_threshold(250.0));
    assert_eq!(channel.generation(), before + 1);
    assert!(!settings.set_threshold(250.0));
    assert_eq!(channel.generation(), before + 1);

    channel.flush().await;
    let updates = recorder.updates();
    assert_eq!(updates.len(), 2);
    let MapUpdate::Ready(result) = &updates[1] else {
        panic!("expected a result");
    };
    // 200 is now below the threshold
    assert_eq!(result.data.image().to_luma_alpha8().get_pixel(0, 0).0, [0, 255]);
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn test_session_file_through_app() {
    let dir = TempDir::new().unwrap();
    globe_image().save(dir.path().join("globe.png")).unwrap();
    let session = SessionConfig::from_json(
        r#"{
            "composite": "single",
            "pipelines": [{
                "source": {"type": "static_image", "name": "globe", "path": "globe.png"},
                "stages": [{"type": "threshold", "threshold": 128.0}]
            }],
            "window": {
                "extent": {"min_x": 0.0, "min_y": -90.0, "width": 360.0, "height": 180.0},
                "ppd": 0.2
            }
        }"#,
    )
    .unwrap();
    let path = dir.path().join("session.json");
    session.save(&path).unwrap();

    let app = MapApp::start_sync(AppConfig::default()).unwrap();
    let loaded = SessionConfig::load(&path).unwrap();
    let request = loaded.window.unwrap().to_request().unwrap();
    let pipelines = loaded
        .build(&app.build_context().with_base_dir(dir.path()))
        .unwrap();

    let view = Arc::new(OffscreenView::new(request));
    let channel = app.create_channel(view.clone());
    channel.set_pipelines(pipelines).unwrap();
    let outcome = app.block_on(channel.set_map_window(request).wait()).unwrap();

    assert_eq!(outcome, PassOutcome::Delivered);
    let image = view.snapshot();
    assert_eq!(image.dimensions(), (72, 36));
    // Block (7, 0) holds 255, block (0, 0) holds 0
    assert_eq!(image.get_pixel(70, 1).0, [255, 255, 255, 255]);
    assert_eq!(image.get_pixel(1, 1).0, [0, 0, 0, 255]);

    let cache = app.tile_cache().unwrap();
    assert_eq!(cache.misses(), 1);

    app.shutdown();
    assert!(channel.is_shut_down());
}
