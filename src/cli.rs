//! Command-line interface

use clap::{Parser, Subcommand, ValueEnum};

/// Reflect MCP connector: stdio MCP server and OAuth helper
#[derive(Parser, Debug)]
#[command(name = "reflect-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error) or an `EnvFilter` directive
    #[arg(long, default_value = "info", env = "REFLECT_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format
    #[arg(long, value_enum, env = "REFLECT_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format (always written to stderr)
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Name understood by [`crate::setup_tracing`]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the MCP server on stdio (default)
    Serve,

    /// OAuth helpers
    #[command(subcommand)]
    Auth(AuthCommand),
}

/// OAuth subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum AuthCommand {
    /// Run the browser login and print an access token
    Login,
}
