//! Serve command handler.

use std::sync::Arc;

use anyhow::Result;
use relay_axum::{ServerConfig, start_server};
use relay_upstream::OpenAiCompatInvoker;
use tracing::info;

use crate::commands::ServeArgs;

/// Execute the serve command.
///
/// Reads the environment, applies flag overrides and runs until Ctrl-C.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = args.apply(ServerConfig::from_env()?);
    info!(
        address = %config.bind_address(),
        auth_enabled = config.auth_token.is_some(),
        "Starting relay server"
    );
    start_server(config, Arc::new(OpenAiCompatInvoker::new())).await
}
