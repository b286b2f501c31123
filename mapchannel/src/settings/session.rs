//! Saved sessions: which pipelines a channel runs and over which window.
//!
//! Every config type here is a plain value that knows how to build its live
//! counterpart (`create_source`, `create_stage`, `create_composite`,
//! [`PipelineConfig::build`]), so callers never inspect a config to decide
//! what to construct.
//!
//! ```json
//! {
//!   "composite": "single",
//!   "pipelines": [{
//!     "source": { "type": "static_image", "name": "albedo", "path": "albedo.png" },
//!     "stages": [{ "type": "threshold", "threshold": 128.0 }]
//!   }],
//!   "window": { "extent": { "min_x": 0, "min_y": -90, "width": 360, "height": 180 }, "ppd": 1 }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::SettingsError;
use super::threshold::{ThresholdConfig, ThresholdSettings};
use crate::composite::{CompositeStage, NoComposite, RgbComposite, SingleComposite};
use crate::geo::{GeoRect, GeoRequest, Projection};
use crate::pipeline::{Pipeline, PipelineError};
use crate::raster::MapAttr;
use crate::source::{
    CachingMapSource, HttpMapSource, MapSource, ReqwestClient, StaticImageMapSource, TileCache,
    DEFAULT_HTTP_TIMEOUT_SECS,
};
use crate::stage::{Stage, ThresholdStage};

/// Shared resources used while building live objects from configs.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Cache wrapped around every source, if any.
    pub cache: Option<TileCache>,
    /// Timeout for map server requests.
    pub http_timeout_secs: u64,
    /// Directory relative image paths are resolved against.
    pub base_dir: Option<PathBuf>,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self {
            cache: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            base_dir: None,
        }
    }
}

impl BuildContext {
    /// Wrap sources with `cache`.
    pub fn with_cache(mut self, cache: TileCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolve relative paths against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Set the HTTP timeout.
    pub fn with_http_timeout(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Where a pipeline's tiles come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A global image file in simple cylindrical layout.
    StaticImage {
        name: String,
        path: PathBuf,
        /// `(lon, lat)` shift subtracted before sampling.
        #[serde(default)]
        offset: [f64; 2],
        /// Per-band no-data values.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ignore_values: Option<Vec<f64>>,
    },
    /// A WMS-style map server layer.
    Wms {
        name: String,
        url: String,
        layer: String,
        attr: MapAttr,
        max_ppd: f64,
    },
}

impl SourceConfig {
    /// Name of the source.
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::StaticImage { name, .. } | SourceConfig::Wms { name, .. } => name,
        }
    }

    /// Build the live source, wrapped in the context's cache if it has one.
    ///
    /// Safe to call from async code. WMS sources defer building their HTTP
    /// client until the first request.
    pub fn create_source(&self, ctx: &BuildContext) -> Result<Arc<dyn MapSource>, SettingsError> {
        let source: Arc<dyn MapSource> = match self {
            SourceConfig::StaticImage {
                name,
                path,
                offset,
                ignore_values,
            } => {
                let mut source = StaticImageMapSource::open(name.as_str(), ctx.resolve(path))?
                    .with_offset(offset[0], offset[1]);
                if let Some(values) = ignore_values {
                    source = source.with_ignore_values(values.clone());
                }
                Arc::new(source)
            }
            SourceConfig::Wms {
                name,
                url,
                layer,
                attr,
                max_ppd,
            } => {
                let client = ReqwestClient::with_timeout(ctx.http_timeout_secs)
                    .map_err(|e| PipelineError::source_failed(name.as_str(), e.to_string()))?;
                Arc::new(HttpMapSource::new(
                    name.as_str(),
                    url.as_str(),
                    layer.as_str(),
                    *attr,
                    *max_ppd,
                    client,
                ))
            }
        };

        Ok(match &ctx.cache {
            Some(cache) => Arc::new(CachingMapSource::new(source, cache.clone())),
            None => source,
        })
    }
}

/// One processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageConfig {
    Threshold(ThresholdConfig),
}

impl StageConfig {
    /// Build the live stage with fresh settings.
    pub fn create_stage(&self) -> Arc<dyn Stage> {
        match self {
            StageConfig::Threshold(config) => Arc::new(ThresholdStage::new(Arc::new(
                ThresholdSettings::new(*config),
            ))),
        }
    }
}

/// How pipeline outputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeConfig {
    #[default]
    Single,
    Rgb,
    None,
}

impl CompositeConfig {
    /// Build the live composite.
    pub fn create_composite(&self) -> Arc<dyn CompositeStage> {
        match self {
            CompositeConfig::Single => Arc::new(SingleComposite::new()),
            CompositeConfig::Rgb => Arc::new(RgbComposite::new()),
            CompositeConfig::None => Arc::new(NoComposite::new()),
        }
    }
}

/// A source and its stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl PipelineConfig {
    /// Build and validate the live pipeline feeding `composite`.
    pub fn build(
        &self,
        composite: Arc<dyn CompositeStage>,
        ctx: &BuildContext,
    ) -> Result<Pipeline, SettingsError> {
        let source = self.source.create_source(ctx)?;
        let stages = self.stages.iter().map(StageConfig::create_stage).collect();
        Ok(Pipeline::build(source, stages, composite)?)
    }
}

/// Map window saved with a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub extent: GeoRect,
    pub ppd: f64,
    #[serde(default)]
    pub projection: Projection,
}

impl WindowConfig {
    /// The request this window describes.
    pub fn to_request(&self) -> Result<GeoRequest, SettingsError> {
        GeoRequest::new(self.extent, self.ppd, self.projection)
            .map_err(|e| SettingsError::Pipeline(e.into()))
    }
}

impl From<GeoRequest> for WindowConfig {
    fn from(request: GeoRequest) -> Self {
        Self {
            extent: request.extent(),
            ppd: request.ppd(),
            projection: request.projection(),
        }
    }
}

/// A complete saved session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub composite: CompositeConfig,
    pub pipelines: Vec<PipelineConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowConfig>,
}

impl SessionConfig {
    /// Parse a session document.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to a pretty-printed document.
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a session file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        let session = Self::from_json(&text)?;
        debug!(
            path = %path.display(),
            pipelines = session.pipelines.len(),
            "Loaded session"
        );
        Ok(session)
    }

    /// Write a session file.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Build every pipeline around one shared composite.
    pub fn build(&self, ctx: &BuildContext) -> Result<Vec<Pipeline>, SettingsError> {
        let composite = self.composite.create_composite();
        self.pipelines
            .iter()
            .map(|p| p.build(Arc::clone(&composite), ctx))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    const SESSION: &str = r#"{
        "composite": "single",
        "pipelines": [{
            "source": { "type": "static_image", "name": "albedo", "path": "albedo.png" },
            "stages": [{ "type": "threshold", "threshold": 100.0 }]
        }],
        "window": {
            "extent": { "min_x": 0, "min_y": -90, "width": 360, "height": 180 },
            "ppd": 0.5
        }
    }"#;

    #[test]
    fn test_parse_session() {
        let session = SessionConfig::from_json(SESSION).unwrap();
        assert_eq!(session.composite, CompositeConfig::Single);
        assert_eq!(session.pipelines.len(), 1);
        assert_eq!(session.pipelines[0].source.name(), "albedo");
        assert_eq!(
            session.pipelines[0].stages,
            vec![StageConfig::Threshold(ThresholdConfig::new(100.0))]
        );
        let window = session.window.unwrap();
        assert_eq!(window.projection, Projection::Equirectangular);
        assert_eq!(window.to_request().unwrap().width_px(), 180);
    }

    #[test]
    fn test_json_round_trip() {
        let session = SessionConfig {
            composite: CompositeConfig::Rgb,
            pipelines: vec![PipelineConfig {
                source: SourceConfig::Wms {
                    name: "shade".into(),
                    url: "http://maps.example.com/wms".into(),
                    layer: "mola_shade".into(),
                    attr: MapAttr::Gray,
                    max_ppd: 64.0,
                },
                stages: vec![],
            }],
            window: Some(WindowConfig {
                extent: GeoRect::new(-5.0, -5.0, 10.0, 10.0),
                ppd: 8.0,
                projection: Projection::oblique(137.4, -4.6),
            }),
        };
        let json = session.to_json().unwrap();
        assert_eq!(SessionConfig::from_json(&json).unwrap(), session);
    }

    #[test]
    fn test_unknown_source_type() {
        let err = SessionConfig::from_json(
            r#"{ "pipelines": [{ "source": { "type": "ftp", "name": "x" } }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn test_build_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        GrayImage::from_fn(8, 4, |x, _| Luma([x as u8 * 30]))
            .save(dir.path().join("albedo.png"))
            .unwrap();
        let session_path = dir.path().join("session.json");
        std::fs::write(&session_path, SESSION).unwrap();

        let session = SessionConfig::load(&session_path).unwrap();
        let ctx = BuildContext::default()
            .with_base_dir(dir.path())
            .with_cache(TileCache::default());
        let pipelines = session.build(&ctx).unwrap();

        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].name(), "albedo");
        assert_eq!(pipelines[0].final_attr(), Some(MapAttr::Gray));
        assert_eq!(pipelines[0].stages().len(), 1);
    }

    #[test]
    fn test_missing_image_fails_build() {
        let session = SessionConfig::from_json(SESSION).unwrap();
        let ctx = BuildContext::default().with_base_dir("/nonexistent");
        assert!(matches!(
            session.build(&ctx),
            Err(SettingsError::Pipeline(PipelineError::SourceFailed { .. }))
        ));
    }

    #[test]
    fn test_invalid_window() {
        let window = WindowConfig {
            extent: GeoRect::new(0.0, 0.0, 10.0, 10.0),
            ppd: -1.0,
            projection: Projection::Equirectangular,
        };
        assert!(window.to_request().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("s.json");
        let session = SessionConfig::from_json(SESSION).unwrap();
        session.save(&path).unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap(), session);
    }

    #[tokio::test]
    async fn test_build_wms_session_in_runtime() {
        let session = SessionConfig {
            composite: CompositeConfig::Single,
            pipelines: vec![PipelineConfig {
                source: SourceConfig::Wms {
                    name: "shade".into(),
                    url: "http://maps.example.com/wms".into(),
                    layer: "mola_shade".into(),
                    attr: MapAttr::Gray,
                    max_ppd: 64.0,
                },
                stages: vec![],
            }],
            window: None,
        };
        let ctx = BuildContext::default().with_cache(TileCache::default());

        let pipelines = session.build(&ctx).unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].name(), "shade");
        drop(pipelines);
    }
}
