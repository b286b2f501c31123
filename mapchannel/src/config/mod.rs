//! User configuration in `~/.mapchannel/config.ini`.
//!
//! Settings structs live in [`settings`], parsing in `parser` and
//! serialization in `writer`. A missing file means defaults.

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    CacheSettings, ChannelSettings, ConfigFile, HttpSettings, LoggingSettings,
    DEFAULT_LOG_DIRECTORY, DEFAULT_LOG_FILE,
};
