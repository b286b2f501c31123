//! Configuration values and their defaults.

use std::path::PathBuf;

use crate::pipeline::{DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS};
use crate::source::{DEFAULT_CACHE_TILES, DEFAULT_HTTP_TIMEOUT_SECS};

/// Default log directory, relative to the working directory.
pub const DEFAULT_LOG_DIRECTORY: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "mapchannel.log";

/// Complete configuration file contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub channel: ChannelSettings,
    pub cache: CacheSettings,
    pub http: HttpSettings,
    pub logging: LoggingSettings,
}

/// `[channel]`: retry behavior for transient source failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSettings {
    /// Fetch attempts per pass, including the first.
    pub max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            retry_max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

/// `[cache]`: the shared tile cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Tile budget; 0 disables caching.
    pub max_tiles: u64,
    /// Entry lifetime; `None` keeps tiles until evicted.
    pub ttl_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_tiles: DEFAULT_CACHE_TILES,
            ttl_secs: None,
        }
    }
}

/// `[http]`: map server requests.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// `[logging]`: where the log file goes.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}
