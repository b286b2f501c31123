//! `render` command: run a session once and save the result as a PNG.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use mapchannel::app::{AppConfig, MapApp};
use mapchannel::channel::PassOutcome;
use mapchannel::config::ConfigFile;
use mapchannel::geo::{GeoRect, GeoRequest, Projection};
use mapchannel::settings::{
    PipelineConfig, SessionConfig, SourceConfig, StageConfig, ThresholdConfig, WindowConfig,
    DEFAULT_THRESHOLD,
};
use mapchannel::view::OffscreenView;
use tracing::info;

use crate::error::CliError;

const GLOBE: GeoRect = GeoRect {
    min_x: 0.0,
    min_y: -90.0,
    width: 360.0,
    height: 180.0,
};

/// Arguments for `render`.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Session file (JSON) describing the pipelines
    #[arg(long, short, required_unless_present = "image", conflicts_with = "image")]
    pub session: Option<PathBuf>,

    /// Global equirectangular image to threshold (instead of a session)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Output PNG path
    #[arg(long, short)]
    pub output: PathBuf,

    /// Window as min_lon,min_lat,width,height (overrides the session window)
    #[arg(long, value_parser = parse_extent, allow_hyphen_values = true)]
    pub extent: Option<GeoRect>,

    /// Pixels per degree (overrides the session window)
    #[arg(long)]
    pub ppd: Option<f64>,

    /// Threshold for --image, or override for every threshold stage in the session
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Oblique cylindrical projection center longitude
    #[arg(long, requires = "center_lat", allow_hyphen_values = true)]
    pub center_lon: Option<f64>,

    /// Oblique cylindrical projection center latitude
    #[arg(long, requires = "center_lon", allow_hyphen_values = true)]
    pub center_lat: Option<f64>,

    /// Do not cache fetched tiles
    #[arg(long)]
    pub no_cache: bool,
}

/// Parse `min_lon,min_lat,width,height`.
fn parse_extent(s: &str) -> Result<GeoRect, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{}': {}", p, e)))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(GeoRect::new(*x, *y, *w, *h)),
        _ => Err(format!("expected 4 comma-separated numbers, got {}", parts.len())),
    }
}

/// Session for a single image: one static source and one threshold stage
/// over the whole globe.
fn image_session(path: &Path, threshold: f64) -> SessionConfig {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    SessionConfig {
        pipelines: vec![PipelineConfig {
            source: SourceConfig::StaticImage {
                name,
                path: path.to_path_buf(),
                offset: [0.0, 0.0],
                ignore_values: None,
            },
            stages: vec![StageConfig::Threshold(ThresholdConfig::new(threshold))],
        }],
        window: Some(WindowConfig {
            extent: GLOBE,
            ppd: 1.0,
            projection: Projection::Equirectangular,
        }),
        ..Default::default()
    }
}

/// Pick the render window from CLI overrides and the session.
fn resolve_window(args: &RenderArgs, session: &SessionConfig) -> Result<GeoRequest, CliError> {
    let saved = session.window;
    let extent = args
        .extent
        .or(saved.map(|w| w.extent))
        .ok_or_else(|| CliError::Config("no window in session; pass --extent".to_string()))?;
    let ppd = args.ppd.or(saved.map(|w| w.ppd)).unwrap_or(1.0);
    let projection = match (args.center_lon, args.center_lat) {
        (Some(lon), Some(lat)) => Projection::oblique(lon, lat),
        _ => saved.map(|w| w.projection).unwrap_or_default(),
    };

    GeoRequest::new(extent, ppd, projection).map_err(|e| CliError::Config(e.to_string()))
}

fn apply_threshold(session: &mut SessionConfig, threshold: f64) {
    for stage in session.pipelines.iter_mut().flat_map(|p| p.stages.iter_mut()) {
        match stage {
            StageConfig::Threshold(config) => config.threshold = threshold,
        }
    }
}

/// Run the render command.
pub fn run(args: RenderArgs, config: &ConfigFile) -> Result<(), CliError> {
    let (mut session, base_dir) = match (&args.session, &args.image) {
        (Some(path), _) => (SessionConfig::load(path)?, path.parent().map(Path::to_path_buf)),
        (None, Some(image)) => (
            image_session(image, args.threshold.unwrap_or(DEFAULT_THRESHOLD)),
            None,
        ),
        (None, None) => {
            return Err(CliError::Config("pass --session or --image".to_string()));
        }
    };
    if let Some(threshold) = args.threshold {
        apply_threshold(&mut session, threshold);
    }
    let request = resolve_window(&args, &session)?;

    let mut app_config = AppConfig::from_config_file(config);
    if args.no_cache {
        app_config = app_config.without_cache();
    }
    let app = MapApp::start_sync(app_config)?;

    let mut ctx = app.build_context();
    if let Some(dir) = base_dir {
        ctx = ctx.with_base_dir(dir);
    }
    let pipelines = session.build(&ctx)?;
    info!(pipelines = pipelines.len(), request = %request, "Rendering session");

    let view = Arc::new(OffscreenView::new(request));
    let channel = app.create_channel(view.clone());
    channel.set_pipelines(pipelines)?;
    let pass = channel.set_map_window(request);

    let outcome = app.block_on(pass.wait())?;
    app.shutdown();

    match outcome {
        PassOutcome::Delivered => save_png(&view, &args.output),
        PassOutcome::Failed(e) => Err(CliError::Render(e)),
        PassOutcome::Superseded | PassOutcome::Idle => Err(CliError::Config(
            "session produced no pass (no pipelines?)".to_string(),
        )),
    }
}

fn save_png(view: &OffscreenView, path: &Path) -> Result<(), CliError> {
    let image = view.snapshot();
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|error| CliError::FileWrite {
            path: path.display().to_string(),
            error,
        })?;
    println!(
        "Wrote {}x{} image to {}",
        image.width(),
        image.height(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    fn args(dir: &Path) -> RenderArgs {
        RenderArgs {
            session: Some(dir.join("session.json")),
            image: None,
            output: dir.join("out.png"),
            extent: None,
            ppd: None,
            threshold: None,
            center_lon: None,
            center_lat: None,
            no_cache: true,
        }
    }

    fn write_session(dir: &Path, window: bool) {
        let image = GrayImage::from_fn(8, 4, |x, _| Luma([if x < 4 { 50 } else { 200 }]));
        image.save(dir.join("globe.png")).unwrap();

        let json = format!(
            r#"{{
                "pipelines": [{{
                    "source": {{"type": "static_image", "name": "globe", "path": "globe.png"}},
                    "stages": [{{"type": "threshold", "threshold": 128.0}}]
                }}]{}
            }}"#,
            if window {
                r#", "window": {"extent": {"min_x": 0.0, "min_y": -90.0, "width": 360.0, "height": 180.0}, "ppd": 0.5}"#
            } else {
                ""
            }
        );
        std::fs::write(dir.join("session.json"), json).unwrap();
    }

    #[test]
    fn test_render_single_image() {
        let dir = TempDir::new().unwrap();
        write_session(dir.path(), false);
        let mut args = args(dir.path());
        args.session = None;
        args.image = Some(dir.path().join("globe.png"));
        args.ppd = Some(0.25);
        args.threshold = Some(250.0);

        run(args, &ConfigFile::default()).unwrap();

        let out = image::open(dir.path().join("out.png")).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (90, 45));
        // Nothing reaches 250
        assert_eq!(out.get_pixel(80, 20).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_center_overrides_projection() {
        let dir = TempDir::new().unwrap();
        let mut args = args(dir.path());
        args.center_lon = Some(30.0);
        args.center_lat = Some(-10.0);
        let session = image_session(Path::new("x.png"), 1.0);

        let request = resolve_window(&args, &session).unwrap();
        assert_eq!(request.projection(), Projection::oblique(30.0, -10.0));
        assert_eq!(request.extent(), GLOBE);
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut args = args(dir.path());
        args.ppd = Some(1000.0);
        let session = image_session(Path::new("x.png"), 1.0);

        assert!(matches!(
            resolve_window(&args, &session),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_parse_extent() {
        let rect = parse_extent("-10, 20,30,40").unwrap();
        assert_eq!(rect, GeoRect::new(-10.0, 20.0, 30.0, 40.0));
        assert!(parse_extent("1,2,3").is_err());
        assert!(parse_extent("1,2,x,4").is_err());
    }

    #[test]
    fn test_apply_threshold_overrides_every_stage() {
        let mut session = SessionConfig {
            pipelines: vec![PipelineConfig {
                source: SourceConfig::StaticImage {
                    name: "a".to_string(),
                    path: "a.png".into(),
                    offset: [0.0, 0.0],
                    ignore_values: None,
                },
                stages: vec![StageConfig::Threshold(ThresholdConfig::new(1.0))],
            }],
            ..Default::default()
        };
        apply_threshold(&mut session, 77.0);
        assert_eq!(
            session.pipelines[0].stages[0],
            StageConfig::Threshold(ThresholdConfig::new(77.0))
        );
    }

    #[test]
    fn test_missing_window_is_reported() {
        let dir = TempDir::new().unwrap();
        write_session(dir.path(), false);
        let result = run(args(dir.path()), &ConfigFile::default());
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_render_writes_png() {
        let dir = TempDir::new().unwrap();
        write_session(dir.path(), true);

        run(args(dir.path()), &ConfigFile::default()).unwrap();

        let out = image::open(dir.path().join("out.png")).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (180, 90));
        // West half is below the threshold, east half above
        assert_eq!(out.get_pixel(10, 45).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(170, 45).0, [255, 255, 255, 255]);
    }
}
