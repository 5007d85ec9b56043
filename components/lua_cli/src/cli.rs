//! Command line arguments

use clap::{Parser, ValueEnum};

/// How failures are reported on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ErrorFormat {
    /// Message, cause chain and stack trace as plain text
    Text,
    /// A single JSON object
    Json,
}

/// Run Lua chunks through the call bridge
#[derive(Debug, Parser)]
#[command(name = "lua-bridge", version, about)]
pub struct Cli {
    /// Lua source or binary chunk to execute
    #[arg(short, long)]
    pub file: Option<String>,

    /// Inline Lua code to evaluate
    #[arg(short, long)]
    pub eval: Option<String>,

    /// Start the interactive REPL
    #[arg(short, long)]
    pub repl: bool,

    /// TOML file with bridge settings
    #[arg(short, long)]
    pub config: Option<String>,

    /// Do not open the standard libraries, whatever the config says
    #[arg(long)]
    pub bare: bool,

    /// Error report format
    #[arg(long, value_enum, default_value_t = ErrorFormat::Text)]
    pub error_format: ErrorFormat,
}
