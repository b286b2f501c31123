//! Geographic coordinate module
//!
//! Provides world/pixel rectangles, the projections that map world
//! coordinates onto the planet's longitude/latitude grid, and the
//! [`GeoRequest`] value every pipeline pass is rendered for.

mod request;
mod types;

pub use request::{GeoRequest, MAX_RASTER_PIXELS};
pub use types::{normalize_lon, GeoError, GeoRect, PixelRect, Projection};

#[cfg(test)]
mod tests;
