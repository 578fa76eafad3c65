//! Command-line interface.

use clap::{Parser, Subcommand};

use adjutant_domain::config::Config;

#[derive(Parser)]
#[command(name = "adjutant", about = "Personal-assistant gateway", version)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "adjutant.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Config inspection commands.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version.
    Version,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report problems.
    Validate,
    /// Print the effective config (defaults applied).
    Show,
}

/// Load the config file; a missing file yields defaults so a bare
/// `adjutant serve` works out of the box.
pub fn load_config(path: &str) -> anyhow::Result<Config> {
    match std::fs::read_to_string(path) {
        Ok(raw) => {
            let config = Config::from_toml_str(&raw)?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path, "config file not found — using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn validate(path: &str) -> bool {
    match std::fs::read_to_string(path) {
        Ok(raw) => match Config::from_toml_str(&raw) {
            Ok(_) => {
                println!("{path}: OK");
                true
            }
            Err(e) => {
                eprintln!("{path}: {e}");
                false
            }
        },
        Err(e) => {
            eprintln!("{path}: {e}");
            false
        }
    }
}

pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}
