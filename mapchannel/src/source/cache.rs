//! Shared tile cache and the caching source decorator.
//!
//! The cache is an explicit object owned by [`MapApp`](crate::app::MapApp)
//! and handed to every [`CachingMapSource`] that should share it. Entries
//! are keyed by source name and the exact request, so a window that returns
//! to a previously rendered position is served without touching the source.
//! moka handles eviction when the tile budget is exceeded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache as MokaCache;
use tracing::trace;

use super::types::MapSource;
use crate::geo::{GeoRect, GeoRequest, Projection};
use crate::pipeline::PipelineError;
use crate::raster::{MapAttr, MapData};

/// Default number of tiles kept in memory.
pub const DEFAULT_CACHE_TILES: u64 = 256;

/// Cache key: source name plus the exact bits of the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    source: String,
    extent: [u64; 4],
    ppd: u64,
    projection: [u64; 3],
}

impl TileKey {
    /// Build the key for `request` on the named source.
    pub fn new(source: &str, request: &GeoRequest) -> Self {
        let e = request.extent();
        let projection = match request.projection() {
            Projection::Equirectangular => [0, 0, 0],
            Projection::ObliqueCylindrical {
                center_lon,
                center_lat,
            } => [1, center_lon.to_bits(), center_lat.to_bits()],
        };
        Self {
            source: source.to_string(),
            extent: [
                e.min_x.to_bits(),
                e.min_y.to_bits(),
                e.width.to_bits(),
                e.height.to_bits(),
            ],
            ppd: request.ppd().to_bits(),
            projection,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// In-memory tile cache shared between sources.
///
/// Cloning is cheap and yields a handle to the same cache.
#[derive(Clone)]
pub struct TileCache {
    cache: MokaCache<TileKey, MapData>,
    counters: Arc<Counters>,
}

impl TileCache {
    /// Create a cache holding at most `max_tiles` tiles.
    ///
    /// # Arguments
    ///
    /// * `max_tiles` - Tile budget
    /// * `ttl` - Optional time-to-live for entries
    pub fn new(max_tiles: u64, ttl: Option<Duration>) -> Self {
        let mut builder = MokaCache::builder().max_capacity(max_tiles);
        if let Some(ttl_duration) = ttl {
            builder = builder.time_to_live(ttl_duration);
        }
        Self {
            cache: builder.build(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Look up a tile.
    pub fn get(&self, key: &TileKey) -> Option<MapData> {
        let hit = self.cache.get(key);
        let counter = if hit.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    /// Store a tile.
    pub fn insert(&self, key: TileKey, data: MapData) {
        self.cache.insert(key, data);
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    /// Number of cached tiles (after pending maintenance).
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Lookups served from the cache.
    pub fn hits(&self) -> u64 {
        self.counters.hits.load(Ordering::Relaxed)
    }

    /// Lookups that fell through to the source.
    pub fn misses(&self) -> u64 {
        self.counters.misses.load(Ordering::Relaxed)
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TILES, None)
    }
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("entries", &self.cache.entry_count())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}

/// Decorator that serves repeated requests from a [`TileCache`].
///
/// Failures are never cached.
pub struct CachingMapSource {
    inner: Arc<dyn MapSource>,
    cache: TileCache,
}

impl CachingMapSource {
    /// Wrap `inner` with `cache`.
    pub fn new(inner: Arc<dyn MapSource>, cache: TileCache) -> Self {
        Self { inner, cache }
    }
}

impl MapSource for CachingMapSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn map_attr(&self) -> MapAttr {
        self.inner.map_attr()
    }

    fn lat_lon_bounding_box(&self) -> GeoRect {
        self.inner.lat_lon_bounding_box()
    }

    fn max_ppd(&self) -> f64 {
        self.inner.max_ppd()
    }

    fn offset(&self) -> (f64, f64) {
        self.inner.offset()
    }

    fn ignore_values(&self) -> Option<&[f64]> {
        self.inner.ignore_values()
    }

    fn fetch_tile(&self, request: &GeoRequest) -> Result<MapData, PipelineError> {
        let key = TileKey::new(self.inner.name(), request);
        if let Some(data) = self.cache.get(&key) {
            trace!(source = self.inner.name(), "Tile cache hit");
            return Ok(data);
        }
        let data = self.inner.fetch_tile(request)?;
        self.cache.insert(key, data.clone());
        Ok(data)
    }
}
