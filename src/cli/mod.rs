//! Command-line interface for the `mindmatrix-server` binary.
//!
//! Uses clap for argument parsing and owo-colors for terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MindMatrix - agent and workflow server
#[derive(Parser, Debug)]
#[command(
    name = "mindmatrix-server",
    version,
    about = "MindMatrix - agent and workflow server",
    long_about = "Serves registered agents and workflows over an OpenAI-compatible HTTP API.\n\n\
                  Run without a subcommand to start the server, or use 'init' to write a starter config.",
    after_help = "EXAMPLES:\n    \
                  mindmatrix-server init                  # Write mindmatrix.toml and .env.example\n    \
                  mindmatrix-server                       # Start the server\n    \
                  mindmatrix-server --port 8080 serve     # Override the configured port\n    \
                  mindmatrix-server config --validate     # Check the configuration"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "mindmatrix.toml", global = true)]
    pub config: PathBuf,

    /// Override the configured bind host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Override the configured port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (the default)
    Serve,

    /// Write a starter mindmatrix.toml and .env.example
    Init {
        /// Directory to initialize
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file and report warnings
        #[arg(long)]
        validate: bool,
    },

    /// List registered agents and workflows
    Agents,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
