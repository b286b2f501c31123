//! Raster containers and format descriptors.
//!
//! [`MapData`] is the unit of work passed between pipeline stages, tagged
//! with the [`GeoRequest`](crate::geo::GeoRequest) it was rendered for.
//! [`MapAttr`] describes its band layout and [`ChangedArea`] tracks which
//! part of it is new.

mod attr;
mod changed_area;
mod data;

pub use attr::{MapAttr, DISPLAYABLE, SINGLE_BAND};
pub use changed_area::ChangedArea;
pub use data::MapData;
