use clap::{Parser, Subcommand};

/// rc-server — the admin API for the Responses Run Coordinator.
#[derive(Debug, Parser)]
#[command(name = "rc-server", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the config file.
    #[arg(long, default_value = "config.toml", global = true)]
    pub config: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the admin API server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}
