//! Command-line interface for histdiff

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "histdiff")]
#[command(about = "Row-level history diffs over a versioned table store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show every row change of a table across history
    Diff {
        /// Repository fixture file
        fixture: PathBuf,

        /// Table name (case-insensitive)
        table: String,

        /// Oldest commit to include (commit id, ref or hash)
        #[arg(long)]
        from: Option<String>,

        /// Newest commit to include; defaults to the head plus the working set
        #[arg(long)]
        to: Option<String>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty", value_parser = OutputFormat::parse)]
        format: OutputFormat,
    },

    /// List the history partitions of a table
    Partitions {
        /// Repository fixture file
        fixture: PathBuf,

        /// Table name (case-insensitive)
        table: String,

        /// Oldest commit to include (commit id, ref or hash)
        #[arg(long)]
        from: Option<String>,

        /// Newest commit to include; defaults to the head plus the working set
        #[arg(long)]
        to: Option<String>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty", value_parser = OutputFormat::parse)]
        format: OutputFormat,
    },

    /// Show the reconciled schema of a table across history
    Schema {
        /// Repository fixture file
        fixture: PathBuf,

        /// Table name (case-insensitive)
        table: String,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty", value_parser = OutputFormat::parse)]
        format: OutputFormat,
    },
}

/// Parse output format string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}
