//! Map source backed by a single global image.
//!
//! The backing image is a simple cylindrical map: columns span longitude
//! `[0, 360)` eastward, rows span latitude `90` (top) to `-90` (bottom).
//! Each destination pixel is projected back to lon/lat and sampled with
//! nearest-neighbor lookup.

use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, ImageBuffer, Pixel};
use rayon::prelude::*;
use tracing::{debug, instrument};

use super::types::MapSource;
use crate::geo::GeoRequest;
use crate::pipeline::PipelineError;
use crate::raster::{MapAttr, MapData};

/// Map source that resamples a static in-memory image.
///
/// # Example
///
/// ```
/// use mapchannel::geo::{GeoRect, GeoRequest, Projection};
/// use mapchannel::source::{MapSource, StaticImageMapSource};
/// use image::{DynamicImage, GrayImage};
///
/// let source = StaticImageMapSource::new("albedo", DynamicImage::ImageLuma8(GrayImage::new(8, 4)));
/// let request = GeoRequest::new(GeoRect::new(0.0, -90.0, 360.0, 180.0), 1.0, Projection::Equirectangular).unwrap();
/// let tile = source.fetch_tile(&request).unwrap();
/// assert_eq!(tile.width(), 360);
/// ```
#[derive(Debug, Clone)]
pub struct StaticImageMapSource {
    name: String,
    image: Arc<DynamicImage>,
    offset: (f64, f64),
    ignore_values: Option<Vec<f64>>,
}

impl StaticImageMapSource {
    /// Create a source from an in-memory image.
    pub fn new(name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            name: name.into(),
            image: Arc::new(image),
            offset: (0.0, 0.0),
            ignore_values: None,
        }
    }

    /// Load the backing image from a file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SourceFailed`] if the file cannot be opened
    /// or decoded. A missing file is a configuration problem, not a
    /// transient one.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let name = name.into();
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| {
            PipelineError::source_failed(&name, format!("{}: {}", path.display(), e))
        })?;
        debug!(
            source = %name,
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "Loaded static map image"
        );
        Ok(Self::new(name, image))
    }

    /// Shift the data by a constant `(lon, lat)` offset.
    pub fn with_offset(mut self, dlon: f64, dlat: f64) -> Self {
        self.offset = (dlon, dlat);
        self
    }

    /// Treat pixels whose bands equal these values as no-data.
    pub fn with_ignore_values(mut self, values: Vec<f64>) -> Self {
        self.ignore_values = Some(values);
        self
    }

    /// The backing image.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Backing-image pixel sampled for a spatial coordinate.
    ///
    /// The offset is subtracted first. Returns `None` when the result falls
    /// outside `[0, 360) × (-90, 90]`.
    pub fn sample_position(&self, lon: f64, lat: f64) -> Option<(u32, u32)> {
        let lon = lon - self.offset.0;
        let lat = lat - self.offset.1;
        if !(0.0..360.0).contains(&lon) || !(lat > -90.0 && lat <= 90.0) {
            return None;
        }

        let (w, h) = (self.image.width(), self.image.height());
        let col = (lon * w as f64 / 360.0).floor() as u32;
        let row = ((90.0 - lat) * h as f64 / 180.0).floor() as u32;
        Some((col.min(w - 1), row.min(h - 1)))
    }

    fn resample<P>(
        &self,
        src: &ImageBuffer<P, Vec<P::Subpixel>>,
        request: &GeoRequest,
    ) -> ImageBuffer<P, Vec<P::Subpixel>>
    where
        P: Pixel + Send + Sync,
        P::Subpixel: Send + Sync + Into<f64>,
    {
        let channels = P::CHANNEL_COUNT as usize;
        let (width, height) = (request.width_px(), request.height_px());
        let mut out: ImageBuffer<P, Vec<P::Subpixel>> = ImageBuffer::new(width, height);

        let src_raw: &[P::Subpixel] = src.as_raw();
        let src_width = src.width() as usize;
        let ignore = self.ignore_values.as_deref();
        let row_len = width as usize * channels;

        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, dst)| {
                for col in 0..width {
                    let (lon, lat) = request.pixel_center_spatial(col, row as u32);
                    let Some((sx, sy)) = self.sample_position(lon, lat) else {
                        continue;
                    };
                    let start = (sy as usize * src_width + sx as usize) * channels;
                    let px = &src_raw[start..start + channels];
                    if is_ignored(px, ignore) {
                        continue;
                    }
                    let d = col as usize * channels;
                    dst[d..d + channels].copy_from_slice(px);
                }
            });
        out
    }
}

/// True when every band that has an ignore value matches it.
fn is_ignored<S: Copy + Into<f64>>(px: &[S], ignore: Option<&[f64]>) -> bool {
    match ignore {
        Some(values) if !values.is_empty() => px
            .iter()
            .zip(values)
            .all(|(&sample, &value)| sample.into() == value),
        _ => false,
    }
}

impl MapSource for StaticImageMapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn map_attr(&self) -> MapAttr {
        MapAttr::of_image(&self.image)
    }

    fn max_ppd(&self) -> f64 {
        let (w, h) = (self.image.width() as f64, self.image.height() as f64);
        (w / 360.0).max(h / 180.0)
    }

    fn offset(&self) -> (f64, f64) {
        self.offset
    }

    fn ignore_values(&self) -> Option<&[f64]> {
        self.ignore_values.as_deref()
    }

    #[instrument(skip(self), fields(source = %self.name))]
    fn fetch_tile(&self, request: &GeoRequest) -> Result<MapData, PipelineError> {
        let image = match self.image.as_ref() {
            DynamicImage::ImageLuma8(src) => DynamicImage::ImageLuma8(self.resample(src, request)),
            DynamicImage::ImageLumaA8(src) => {
                DynamicImage::ImageLumaA8(self.resample(src, request))
            }
            DynamicImage::ImageRgb8(src) => DynamicImage::ImageRgb8(self.resample(src, request)),
            DynamicImage::ImageRgba8(src) => DynamicImage::ImageRgba8(self.resample(src, request)),
            DynamicImage::ImageLuma16(src) => {
                DynamicImage::ImageLuma16(self.resample(src, request))
            }
            DynamicImage::ImageLumaA16(src) => {
                DynamicImage::ImageLumaA16(self.resample(src, request))
            }
            DynamicImage::ImageRgb16(src) => DynamicImage::ImageRgb16(self.resample(src, request)),
            DynamicImage::ImageRgba16(src) => {
                DynamicImage::ImageRgba16(self.resample(src, request))
            }
            DynamicImage::ImageRgb32F(src) => {
                DynamicImage::ImageRgb32F(self.resample(src, request))
            }
            DynamicImage::ImageRgba32F(src) => {
                DynamicImage::ImageRgba32F(self.resample(src, request))
            }
            other => DynamicImage::ImageRgba8(self.resample(&other.to_rgba8(), request)),
        };

        debug!(
            width = image.width(),
            height = image.height(),
            "Resampled static image tile"
        );
        MapData::new(image, *request)
    }
}
