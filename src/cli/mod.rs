//! CLI interface and argument parsing

pub mod commands;

use clap::{Parser, Subcommand};

/// Bulk writer for Azure Cosmos DB
#[derive(Parser, Debug)]
#[command(name = "bulkwriter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "bulkwriter.toml", env = "BULKWRITER_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "BULKWRITER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write NDJSON documents to the configured container
    Ingest(commands::ingest::IngestArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),
}
