//! Application configuration for MapApp.

use std::time::Duration;

use crate::channel::ChannelConfig;
use crate::config::ConfigFile;
use crate::source::{DEFAULT_CACHE_TILES, DEFAULT_HTTP_TIMEOUT_SECS};

/// Shared tile cache configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct TileCacheConfig {
    /// Tile budget; 0 disables the cache.
    pub max_tiles: u64,
    /// Optional time-to-live for entries.
    pub ttl: Option<Duration>,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            max_tiles: DEFAULT_CACHE_TILES,
            ttl: None,
        }
    }
}

/// Everything [`MapApp::start`](super::MapApp::start) needs.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// Settings for every channel the app creates.
    pub channel: ChannelConfig,
    /// Shared tile cache.
    pub cache: TileCacheConfig,
    /// Map server request timeout.
    pub http_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            cache: TileCacheConfig::default(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel configuration.
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    /// Set the tile cache configuration.
    pub fn with_cache(mut self, cache: TileCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Disable the shared tile cache.
    pub fn without_cache(self) -> Self {
        self.with_cache(TileCacheConfig {
            max_tiles: 0,
            ttl: None,
        })
    }

    /// Build from a loaded config file.
    pub fn from_config_file(file: &ConfigFile) -> Self {
        Self {
            channel: ChannelConfig::from_config_file(file),
            cache: TileCacheConfig {
                max_tiles: file.cache.max_tiles,
                ttl: file.cache.ttl_secs.map(Duration::from_secs),
            },
            http_timeout_secs: file.http.timeout_secs,
        }
    }
}
