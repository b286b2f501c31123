//! Map source trait.

use crate::geo::{GeoRect, GeoRequest};
use crate::pipeline::PipelineError;
use crate::raster::{MapAttr, MapData};

/// Whole-planet lon/lat box: `[0, 360) × [-90, 90]`.
pub const GLOBAL_BOUNDS: GeoRect = GeoRect {
    min_x: 0.0,
    min_y: -90.0,
    width: 360.0,
    height: 180.0,
};

/// Supplies raster tiles for geographic requests.
///
/// Implementations may block (file or network I/O); the channel calls
/// [`MapSource::fetch_tile`] from a blocking worker, never from the thread
/// that issues window changes.
///
/// # Errors
///
/// Transient failures must be reported as
/// [`PipelineError::Unavailable`] so the channel retries them; anything
/// else is treated as permanent.
pub trait MapSource: Send + Sync {
    /// Name for logging and identification.
    fn name(&self) -> &str;

    /// Band layout of the tiles this source returns.
    fn map_attr(&self) -> MapAttr;

    /// Lon/lat region where this source has data.
    fn lat_lon_bounding_box(&self) -> GeoRect {
        GLOBAL_BOUNDS
    }

    /// Native resolution: the highest pixels-per-degree worth requesting.
    fn max_ppd(&self) -> f64;

    /// Constant `(lon, lat)` offset applied before sampling.
    fn offset(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    /// Per-band no-data sentinel values, if any.
    fn ignore_values(&self) -> Option<&[f64]> {
        None
    }

    /// Render a tile covering `request`.
    fn fetch_tile(&self, request: &GeoRequest) -> Result<MapData, PipelineError>;
}
