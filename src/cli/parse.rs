//! CLI parse: clap types for querybind. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// querybind - mount a query binding and print each result it produces
#[derive(Parser)]
#[command(name = "querybind")]
#[command(about = "Bind a query to in-memory element state and watch its results")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (for config/ lookup)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bind a GET query and print its results
    Get {
        /// Absolute URL, or a path joined onto transport.base_url
        url: String,

        #[command(flatten)]
        request: RequestArgs,
    },
    /// Bind a POST query and print its results
    Post {
        /// Absolute URL, or a path joined onto transport.base_url
        url: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,

        #[command(flatten)]
        request: RequestArgs,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Options shared by the request commands
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Request header (repeatable)
    #[arg(long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Query string parameter (repeatable)
    #[arg(long = "query", value_name = "NAME=VALUE")]
    pub query: Vec<String>,

    /// Read the response body as text instead of JSON
    #[arg(long)]
    pub text: bool,

    /// Override client.stale_time_ms for this query
    #[arg(long)]
    pub stale_ms: Option<u64>,

    /// Output format (text or json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Show where the global configuration file is read from
    Path,
}
