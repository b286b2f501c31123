//! INI serialization logic for converting `ConfigFile` → INI string.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let ttl = config
        .cache
        .ttl_secs
        .map(|t| t.to_string())
        .unwrap_or_default();

    format!(
        r#"[channel]
; Fetch attempts per pass when a map source is temporarily unavailable
; (including the first attempt)
max_attempts = {}
; Delay before the first retry; doubles after each failure
retry_initial_delay_ms = {}
; Upper bound on the retry delay
retry_max_delay_ms = {}

[cache]
; Number of rendered tiles kept in memory (0 disables the cache)
max_tiles = {}
; Seconds before a cached tile expires (empty = never)
ttl_secs = {}

[http]
; Map server request timeout in seconds
timeout_secs = {}

[logging]
; Directory for the log file
directory = {}
; Log file name (cleared on each start)
file = {}
"#,
        config.channel.max_attempts,
        config.channel.retry_initial_delay_ms,
        config.channel.retry_max_delay_ms,
        config.cache.max_tiles,
        ttl,
        config.http.timeout_secs,
        config.logging.directory.display(),
        config.logging.file,
    )
}
