//! Errors reported by `mapchannel` commands, with hints and exit codes.

use std::fmt;
use std::process;

use mapchannel::app::AppError;
use mapchannel::config::ConfigFileError;
use mapchannel::settings::SettingsError;
use mapchannel::PipelineError;

/// Everything a command can fail with.
#[derive(Debug)]
pub enum CliError {
    /// Log directory or file could not be set up
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Config file could not be read or written
    ConfigFile(ConfigFileError),
    /// Session file could not be loaded or built
    Session(SettingsError),
    /// Application lifecycle error
    App(AppError),
    /// The processing pass failed
    Render(PipelineError),
    /// Output image could not be written
    FileWrite {
        path: String,
        error: image::ImageError,
    },
}

impl CliError {
    /// Print the error (plus a hint where one helps) and exit with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Render(e) if e.is_retryable() => {
                eprintln!();
                eprintln!("The map server may be temporarily unavailable.");
                eprintln!("Try again later or raise max_attempts in the [channel] section.");
            }
            CliError::Session(SettingsError::Json(_)) => {
                eprintln!();
                eprintln!("Session files are JSON with 'pipelines' and an optional 'window'.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Cannot start logging: {}", msg),
            CliError::Config(msg) => write!(f, "{}", msg),
            CliError::ConfigFile(e) => write!(f, "Config file error: {}", e),
            CliError::Session(e) => write!(f, "Session error: {}", e),
            CliError::App(e) => write!(f, "{}", e),
            CliError::Render(e) => write!(f, "Rendering failed: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Cannot write '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Session(e) => Some(e),
            CliError::App(e) => Some(e),
            CliError::Render(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<SettingsError> for CliError {
    fn from(e: SettingsError) -> Self {
        CliError::Session(e)
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::App(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Render(e)
    }
}
