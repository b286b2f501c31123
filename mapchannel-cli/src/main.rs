//! MapChannel CLI - Command-line interface
//!
//! Runs map processing sessions and manages the configuration file.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mapchannel::config::{config_directory, config_file_path, ConfigFile};
use mapchannel::logging::{init_logging, LoggingGuard};

use commands::config::ConfigCommands;
use commands::render::RenderArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "mapchannel")]
#[command(about = "Staged processing of planetary map data", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.mapchannel/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a session to a PNG image
    Render(RenderArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Render(args) => {
            let path = cli.config.clone().unwrap_or_else(config_file_path);
            let config = ConfigFile::load_from(&path)?;
            let _guard = start_logging(&config)?;
            commands::render::run(args, &config)
        }
        Commands::Config(command) => commands::config::run(command, cli.config),
    }
}

fn start_logging(config: &ConfigFile) -> Result<LoggingGuard, CliError> {
    let dir = &config.logging.directory;
    let dir = if dir.is_relative() {
        config_directory().join(dir)
    } else {
        dir.clone()
    };
    init_logging(&dir, &config.logging.file).map_err(|e| CliError::LoggingInit(e.to_string()))
}
