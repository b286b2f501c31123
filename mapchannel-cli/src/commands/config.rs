//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use mapchannel::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a commented configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<PathBuf>) -> Result<(), CliError> {
    let path = config_path.unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Init { force } => run_init(&path, force),
    }
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;

    println!("[channel]");
    println!("  max_attempts           = {}", config.channel.max_attempts);
    println!("  retry_initial_delay_ms = {}", config.channel.retry_initial_delay_ms);
    println!("  retry_max_delay_ms     = {}", config.channel.retry_max_delay_ms);
    println!("[cache]");
    println!("  max_tiles              = {}", config.cache.max_tiles);
    match config.cache.ttl_secs {
        Some(ttl) => println!("  ttl_secs               = {}", ttl),
        None => println!("  ttl_secs               = (never)"),
    }
    println!("[http]");
    println!("  timeout_secs           = {}", config.http.timeout_secs);
    println!("[logging]");
    println!("  directory              = {}", config.logging.directory.display());
    println!("  file                   = {}", config.logging.file);

    if !path.exists() {
        println!();
        println!("(defaults; {} does not exist)", path.display());
    }
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    ConfigFile::default().save_to(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
