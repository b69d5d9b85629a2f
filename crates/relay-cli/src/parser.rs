//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// HTTP/SSE relay for multi-round tool-calling conversations.
#[derive(Debug, Parser)]
#[command(name = "relay")]
#[command(about = "Relay LLM completions and tool-calling rounds over HTTP/SSE")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
