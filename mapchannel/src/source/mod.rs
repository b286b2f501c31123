//! Map sources: where raster tiles come from.
//!
//! - [`StaticImageMapSource`] resamples one global image held in memory
//! - [`HttpMapSource`] asks a WMS-style map server for each tile
//! - [`CachingMapSource`] decorates any source with a shared [`TileCache`]

mod cache;
mod http;
mod static_image;
mod types;
mod wms;

pub use cache::{CachingMapSource, TileCache, TileKey, DEFAULT_CACHE_TILES};
pub use http::{HttpClient, HttpError, ReqwestClient, DEFAULT_HTTP_TIMEOUT_SECS};
pub use static_image::StaticImageMapSource;
pub use types::{MapSource, GLOBAL_BOUNDS};
pub use wms::{srs_name, HttpMapSource};
