//! Subcommands of the `relay` binary.

use clap::{Args, Subcommand};
use relay_axum::ServerConfig;

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP/SSE relay server
    Serve(ServeArgs),

    /// Print the effective configuration (credentials redacted)
    Config,
}

/// Flags for `relay serve`. Each one overrides its environment variable.
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Bind address (RELAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (RELAY_PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Static bearer token required on /api/* (RELAY_AUTH_TOKEN)
    #[arg(long)]
    pub auth_token: Option<String>,
}

impl ServeArgs {
    /// Layer the flags over an environment-derived config.
    #[must_use]
    pub fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(token) = self.auth_token.filter(|t| !t.trim().is_empty()) {
            config.auth_token = Some(token);
        }
        config
    }
}
