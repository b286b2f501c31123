//! Geographic request type.
//!
//! A [`GeoRequest`] describes the raster a pipeline must produce: which part
//! of the world, at what resolution, under which projection. It is an
//! immutable value; a new request is built whenever the visible window,
//! zoom or projection changes.

use super::types::{GeoError, GeoRect, PixelRect, Projection};

/// Largest raster a request may describe (2^28 pixels, 1 GiB as RGBA).
pub const MAX_RASTER_PIXELS: u64 = 1 << 28;

/// Request for a raster covering a world extent at a fixed resolution.
///
/// Pixel `(0, 0)` is the north-west corner of the extent. Pixel centers sit
/// half a pixel in from the edges.
///
/// # Example
///
/// ```
/// use mapchannel::geo::{GeoRect, GeoRequest, Projection};
///
/// let request = GeoRequest::new(
///     GeoRect::new(0.0, -90.0, 360.0, 180.0),
///     1.0,
///     Projection::Equirectangular,
/// )
/// .unwrap();
/// assert_eq!(request.width_px(), 360);
/// assert_eq!(request.height_px(), 180);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRequest {
    extent: GeoRect,
    ppd: f64,
    projection: Projection,
}

impl GeoRequest {
    /// Create a validated request.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] when the resolution is not positive and finite,
    /// the extent is empty, or the rounded raster would have no pixels or
    /// more than [`MAX_RASTER_PIXELS`].
    pub fn new(extent: GeoRect, ppd: f64, projection: Projection) -> Result<Self, GeoError> {
        if !(ppd.is_finite() && ppd > 0.0) {
            return Err(GeoError::InvalidResolution(ppd));
        }
        if extent.is_empty() || !extent.min_x.is_finite() || !extent.min_y.is_finite() {
            return Err(GeoError::InvalidExtent {
                width: extent.width,
                height: extent.height,
            });
        }

        // Sized in f64 so an oversized grid is rejected, not saturated
        let width = (extent.width * ppd).round();
        let height = (extent.height * ppd).round();
        if !(width * height <= MAX_RASTER_PIXELS as f64) {
            return Err(GeoError::RasterTooLarge {
                width_px: width,
                height_px: height,
                max_pixels: MAX_RASTER_PIXELS,
            });
        }
        if width < 1.0 || height < 1.0 {
            return Err(GeoError::EmptyRaster {
                width_px: width as u32,
                height_px: height as u32,
            });
        }

        Ok(Self {
            extent,
            ppd,
            projection,
        })
    }

    /// World extent covered by the raster.
    pub fn extent(&self) -> GeoRect {
        self.extent
    }

    /// Resolution in pixels per degree.
    pub fn ppd(&self) -> f64 {
        self.ppd
    }

    /// Projection used to map world coordinates to lon/lat.
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Raster width in pixels.
    pub fn width_px(&self) -> u32 {
        (self.extent.width * self.ppd).round() as u32
    }

    /// Raster height in pixels.
    pub fn height_px(&self) -> u32 {
        (self.extent.height * self.ppd).round() as u32
    }

    /// Same extent and projection at a different resolution.
    pub fn with_ppd(&self, ppd: f64) -> Result<Self, GeoError> {
        Self::new(self.extent, ppd, self.projection)
    }

    /// World coordinate of the center of pixel `(col, row)`.
    pub fn pixel_center_world(&self, col: u32, row: u32) -> (f64, f64) {
        let x = self.extent.min_x + (col as f64 + 0.5) / self.ppd;
        let y = self.extent.max_y() - (row as f64 + 0.5) / self.ppd;
        (x, y)
    }

    /// Spatial lon/lat of the center of pixel `(col, row)`.
    pub fn pixel_center_spatial(&self, col: u32, row: u32) -> (f64, f64) {
        let (x, y) = self.pixel_center_world(col, row);
        self.projection.world_to_spatial(x, y)
    }

    /// Fractional pixel position of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.extent.min_x) * self.ppd,
            (self.extent.max_y() - y) * self.ppd,
        )
    }

    /// Pixels touched by a world rectangle, rounded outward and clamped.
    ///
    /// Returns `None` when the rectangle misses the raster entirely.
    pub fn pixel_rect(&self, rect: &GeoRect) -> Option<PixelRect> {
        let clipped = self.extent.intersection(rect)?;
        let (fx0, fy0) = self.world_to_pixel(clipped.min_x, clipped.max_y());
        let (fx1, fy1) = self.world_to_pixel(clipped.max_x(), clipped.min_y);

        let (w, h) = (self.width_px() as f64, self.height_px() as f64);
        let x0 = fx0.floor().clamp(0.0, w) as u32;
        let y0 = fy0.floor().clamp(0.0, h) as u32;
        let x1 = fx1.ceil().clamp(0.0, w) as u32;
        let y1 = fy1.ceil().clamp(0.0, h) as u32;

        let rect = PixelRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0));
        if rect.is_empty() {
            None
        } else {
            Some(rect)
        }
    }

    /// World rectangle covered by a block of pixels.
    pub fn pixel_rect_to_world(&self, rect: &PixelRect) -> GeoRect {
        let min_x = self.extent.min_x + rect.x as f64 / self.ppd;
        let max_y = self.extent.max_y() - rect.y as f64 / self.ppd;
        GeoRect::new(
            min_x,
            max_y - rect.height as f64 / self.ppd,
            rect.width as f64 / self.ppd,
            rect.height as f64 / self.ppd,
        )
    }
}

impl std::fmt::Display for GeoRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {} ppd ({}×{} px, {})",
            self.extent,
            self.ppd,
            self.width_px(),
            self.height_px(),
            self.projection
        )
    }
}
