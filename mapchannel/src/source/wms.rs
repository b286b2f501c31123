//! Map source backed by a WMS-style map server.

use image::DynamicImage;
use tracing::{debug, instrument, warn};

use super::http::HttpClient;
use super::types::{MapSource, GLOBAL_BOUNDS};
use crate::geo::{GeoRect, GeoRequest, Projection};
use crate::pipeline::PipelineError;
use crate::raster::{MapAttr, MapData};

/// Fetches tiles with `GetMap` requests.
///
/// The request bbox is expressed in world coordinates of the request's
/// projection; oblique projections are passed to the server as a custom
/// `JMARS:1,<lon>,<lat>` SRS.
pub struct HttpMapSource<C: HttpClient> {
    name: String,
    base_url: String,
    layer: String,
    attr: MapAttr,
    max_ppd: f64,
    bounds: GeoRect,
    client: C,
}

impl<C: HttpClient> HttpMapSource<C> {
    /// Create a source for `layer` on the server at `base_url`.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        layer: impl Into<String>,
        attr: MapAttr,
        max_ppd: f64,
        client: C,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            layer: layer.into(),
            attr,
            max_ppd,
            bounds: GLOBAL_BOUNDS,
            client,
        }
    }

    /// Restrict the advertised data bounds.
    pub fn with_bounds(mut self, bounds: GeoRect) -> Self {
        self.bounds = bounds;
        self
    }

    /// Build the `GetMap` URL for a request.
    pub fn map_url(&self, request: &GeoRequest) -> String {
        let extent = request.extent();
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}SERVICE=WMS&VERSION=1.1.1&REQUEST=GetMap&LAYERS={}&STYLES=&SRS={}\
             &BBOX={},{},{},{}&WIDTH={}&HEIGHT={}&FORMAT=image/png&TRANSPARENT=TRUE",
            self.base_url,
            separator,
            self.layer,
            srs_name(&request.projection()),
            extent.min_x,
            extent.min_y,
            extent.max_x(),
            extent.max_y(),
            request.width_px(),
            request.height_px(),
        )
    }

    fn convert(&self, image: DynamicImage) -> DynamicImage {
        match self.attr {
            MapAttr::SingleBand | MapAttr::Gray => DynamicImage::ImageLuma8(image.to_luma8()),
            MapAttr::GrayAlpha => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
            MapAttr::Color => DynamicImage::ImageRgb8(image.to_rgb8()),
            MapAttr::ColorAlpha => DynamicImage::ImageRgba8(image.to_rgba8()),
        }
    }
}

/// SRS parameter for a projection.
pub fn srs_name(projection: &Projection) -> String {
    match *projection {
        Projection::Equirectangular => "EPSG:4326".to_string(),
        Projection::ObliqueCylindrical {
            center_lon,
            center_lat,
        } => format!("JMARS:1,{},{}", center_lon, center_lat),
    }
}

impl<C: HttpClient> MapSource for HttpMapSource<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn map_attr(&self) -> MapAttr {
        self.attr
    }

    fn lat_lon_bounding_box(&self) -> GeoRect {
        self.bounds
    }

    fn max_ppd(&self) -> f64 {
        self.max_ppd
    }

    #[instrument(skip(self), fields(source = %self.name))]
    fn fetch_tile(&self, request: &GeoRequest) -> Result<MapData, PipelineError> {
        let url = self.map_url(request);
        debug!(url = %url, "Requesting map tile");

        let body = self.client.get(&url).map_err(|e| {
            if e.is_retryable() {
                warn!(error = %e, "Map server temporarily unavailable");
                PipelineError::unavailable(&self.name, e.to_string())
            } else {
                PipelineError::source_failed(&self.name, e.to_string())
            }
        })?;

        let image = image::load_from_memory(&body)
            .map_err(|e| PipelineError::Decode(format!("{}: {}", self.name, e)))?;
        MapData::new(self.convert(image), *request)
    }
}
