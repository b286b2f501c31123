//! INI parsing logic for converting `Ini` → `ConfigFile`.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse `key` from `section` if present.
fn parse_value<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match props.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, v, reason)),
        None => Ok(None),
    }
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [channel] section
    if let Some(section) = ini.section(Some("channel")) {
        if let Some(v) = parse_value::<u32>(
            section,
            "channel",
            "max_attempts",
            "must be a positive integer",
        )? {
            if v == 0 {
                return Err(invalid(
                    "channel",
                    "max_attempts",
                    "0",
                    "must be a positive integer",
                ));
            }
            config.channel.max_attempts = v;
        }
        if let Some(v) = parse_value(
            section,
            "channel",
            "retry_initial_delay_ms",
            "must be an integer (milliseconds)",
        )? {
            config.channel.retry_initial_delay_ms = v;
        }
        if let Some(v) = parse_value(
            section,
            "channel",
            "retry_max_delay_ms",
            "must be an integer (milliseconds)",
        )? {
            config.channel.retry_max_delay_ms = v;
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = parse_value(section, "cache", "max_tiles", "must be an integer")? {
            config.cache.max_tiles = v;
        }
        if let Some(v) = section.get("ttl_secs") {
            let v = v.trim();
            config.cache.ttl_secs = if v.is_empty() {
                None
            } else {
                Some(v.parse().map_err(|_| {
                    invalid("cache", "ttl_secs", v, "must be an integer (seconds) or empty")
                })?)
            };
        }
    }

    // [http] section
    if let Some(section) = ini.section(Some("http")) {
        if let Some(v) = parse_value::<u64>(
            section,
            "http",
            "timeout_secs",
            "must be a positive integer (seconds)",
        )? {
            if v == 0 {
                return Err(invalid(
                    "http",
                    "timeout_secs",
                    "0",
                    "must be a positive integer (seconds)",
                ));
            }
            config.http.timeout_secs = v;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ConfigFile, ConfigFileError> {
        parse_ini(&Ini::load_from_str(text).unwrap())
    }

    #[test]
    fn test_channel_section() {
        let config = parse(
            "[channel]\nmax_attempts = 5\nretry_initial_delay_ms = 20\nretry_max_delay_ms = 900\n",
        )
        .unwrap();
        assert_eq!(config.channel.max_attempts, 5);
        assert_eq!(config.channel.retry_initial_delay_ms, 20);
        assert_eq!(config.channel.retry_max_delay_ms, 900);
    }

    #[test]
    fn test_invalid_number() {
        let err = parse("[channel]\nmax_attempts = lots\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue {
                section,
                key,
                value,
                ..
            } => {
                assert_eq!(section, "channel");
                assert_eq!(key, "max_attempts");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(parse("[channel]\nmax_attempts = 0\n").is_err());
        assert!(parse("[http]\ntimeout_secs = 0\n").is_err());
    }

    #[test]
    fn test_empty_ttl_means_none() {
        let config = parse("[cache]\nttl_secs =\n").unwrap();
        assert_eq!(config.cache.ttl_secs, None);
        let config = parse("[cache]\nttl_secs = 60\n").unwrap();
        assert_eq!(config.cache.ttl_secs, Some(60));
    }

    #[test]
    fn test_logging_section() {
        let config = parse("[logging]\ndirectory = /var/log/mc\nfile = run.log\n").unwrap();
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/mc"));
        assert_eq!(config.logging.file, "run.log");
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/logs"), home.join("logs"));
        }
    }
}
