//! Core geometric types: world rectangles, pixel rectangles and projections.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building geographic requests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// Resolution must be a positive, finite number of pixels per degree.
    #[error("Invalid resolution: {0} pixels per degree")]
    InvalidResolution(f64),

    /// The extent has no area or contains non-finite coordinates.
    #[error("Invalid extent: {width}×{height} degrees")]
    InvalidExtent { width: f64, height: f64 },

    /// The extent is too small to produce a single pixel at this resolution.
    #[error("Request produces an empty raster ({width_px}×{height_px} pixels)")]
    EmptyRaster { width_px: u32, height_px: u32 },

    /// The raster would exceed [`MAX_RASTER_PIXELS`](super::MAX_RASTER_PIXELS).
    #[error("Request produces a {width_px}×{height_px} raster, over the {max_pixels} pixel limit")]
    RasterTooLarge {
        width_px: f64,
        height_px: f64,
        max_pixels: u64,
    },
}

/// Axis-aligned rectangle in projected world coordinates (degrees).
///
/// `min_y` is the southern edge; `y` grows northward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
    /// Western edge.
    pub min_x: f64,
    /// Southern edge.
    pub min_y: f64,
    /// East-west size in degrees.
    pub width: f64,
    /// North-south size in degrees.
    pub height: f64,
}

impl GeoRect {
    /// Create a rectangle from its south-west corner and size.
    pub fn new(min_x: f64, min_y: f64, width: f64, height: f64) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    /// Create a rectangle spanning two arbitrary corners.
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Eastern edge.
    pub fn max_x(&self) -> f64 {
        self.min_x + self.width
    }

    /// Northern edge.
    pub fn max_y(&self) -> f64 {
        self.min_y + self.height
    }

    /// Center point as `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        (
            self.min_x + self.width / 2.0,
            self.min_y + self.height / 2.0,
        )
    }

    /// True when the rectangle has no area (or is not finite).
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite())
    }

    /// Half-open containment test: `[min, max)` on both axes.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x < self.max_x() && y >= self.min_y && y < self.max_y()
    }

    /// True when `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &GeoRect) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    /// Overlapping region, or `None` if the rectangles do not overlap.
    pub fn intersection(&self, other: &GeoRect) -> Option<GeoRect> {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());

        let rect = GeoRect::new(min_x, min_y, max_x - min_x, max_y - min_y);
        if rect.is_empty() {
            None
        } else {
            Some(rect)
        }
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &GeoRect) -> GeoRect {
        let min_x = self.min_x.min(other.min_x);
        let min_y = self.min_y.min(other.min_y);
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        GeoRect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

impl std::fmt::Display for GeoRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.4}, {:.4}]→[{:.4}, {:.4}]",
            self.min_x,
            self.min_y,
            self.max_x(),
            self.max_y()
        )
    }
}

/// Integer pixel rectangle; row 0 is the top (northern) edge of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Create a new pixel rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right column.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom row.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// True when the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the pixel `(x, y)` is inside the rectangle.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Transform between projected world coordinates and spatial lon/lat.
///
/// Longitudes are east-positive degrees. Tagged so a whole projection can be
/// stored in a session file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Projection {
    /// World coordinates are longitude/latitude, unwrapped.
    #[default]
    Equirectangular,
    /// Sphere rotated so that `(center_lon, center_lat)` lands on world `(0, 0)`.
    ObliqueCylindrical {
        /// Longitude of the projection center.
        center_lon: f64,
        /// Latitude of the projection center.
        center_lat: f64,
    },
}

impl Projection {
    /// Create an oblique cylindrical projection centered at the given point.
    pub fn oblique(center_lon: f64, center_lat: f64) -> Self {
        Self::ObliqueCylindrical {
            center_lon,
            center_lat,
        }
    }

    /// Convert world `(x, y)` to spatial `(lon, lat)`.
    ///
    /// The oblique projection normalizes longitude to `[0, 360)`; the
    /// equirectangular projection passes coordinates through untouched.
    pub fn world_to_spatial(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Projection::Equirectangular => (x, y),
            Projection::ObliqueCylindrical {
                center_lon,
                center_lat,
            } => {
                let w = unit_vector(x, y);
                let v = rotate_inverse(w, center_lon, center_lat);
                let (lon, lat) = to_lon_lat(v);
                (normalize_lon(lon), lat)
            }
        }
    }

    /// Convert spatial `(lon, lat)` to world `(x, y)`.
    ///
    /// Oblique world longitudes fall in `(-180, 180]`.
    pub fn spatial_to_world(&self, lon: f64, lat: f64) -> (f64, f64) {
        match *self {
            Projection::Equirectangular => (lon, lat),
            Projection::ObliqueCylindrical {
                center_lon,
                center_lat,
            } => {
                let v = unit_vector(lon, lat);
                let w = rotate_forward(v, center_lon, center_lat);
                to_lon_lat(w)
            }
        }
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Projection::Equirectangular => write!(f, "equirectangular"),
            Projection::ObliqueCylindrical {
                center_lon,
                center_lat,
            } => write!(f, "oblique({:.3}E, {:.3}N)", center_lon, center_lat),
        }
    }
}

/// Wrap a longitude into `[0, 360)`.
pub fn normalize_lon(lon: f64) -> f64 {
    let wrapped = lon.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

fn unit_vector(lon: f64, lat: f64) -> [f64; 3] {
    let (lon, lat) = (lon.to_radians(), lat.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

fn to_lon_lat(v: [f64; 3]) -> (f64, f64) {
    let lon = v[1].atan2(v[0]).to_degrees();
    let lat = v[2].clamp(-1.0, 1.0).asin().to_degrees();
    (lon, lat)
}

/// Apply `Ry(lat) · Rz(-lon)`, which takes the center point to `(1, 0, 0)`.
fn rotate_forward(v: [f64; 3], center_lon: f64, center_lat: f64) -> [f64; 3] {
    let (sl, cl) = center_lon.to_radians().sin_cos();
    let (sp, cp) = center_lat.to_radians().sin_cos();
    let a = [cl * v[0] + sl * v[1], -sl * v[0] + cl * v[1], v[2]];
    [cp * a[0] + sp * a[2], a[1], -sp * a[0] + cp * a[2]]
}

/// Transpose of [`rotate_forward`].
fn rotate_inverse(w: [f64; 3], center_lon: f64, center_lat: f64) -> [f64; 3] {
    let (sl, cl) = center_lon.to_radians().sin_cos();
    let (sp, cp) = center_lat.to_radians().sin_cos();
    let b = [cp * w[0] - sp * w[2], w[1], sp * w[0] + cp * w[2]];
    [cl * b[0] - sl * b[1], sl * b[0] + cl * b[1], b[2]]
}
