//! Config command handler.

use std::fmt::Write;

use anyhow::Result;
use relay_axum::{CorsConfig, ServerConfig};
use relay_core::Provider;

/// Print the configuration `relay serve` would use.
pub fn execute() -> Result<()> {
    let config = ServerConfig::from_env()?;
    print!("{}", render(&config)?);
    Ok(())
}

fn render(config: &ServerConfig) -> Result<String, std::fmt::Error> {
    let cors = match &config.cors {
        CorsConfig::AllowAll => "allow all".to_string(),
        CorsConfig::AllowOrigins(origins) => origins.join(", "),
    };
    let auth = if config.auth_token.is_some() {
        "bearer token"
    } else {
        "disabled"
    };

    let mut out = String::new();
    writeln!(out, "{:<16} {}", "bind:", config.bind_address())?;
    writeln!(out, "{:<16} {auth}", "auth:")?;
    writeln!(out, "{:<16} {cors}", "cors:")?;
    writeln!(out, "{:<16} {}s", "session ttl:", config.session_ttl.as_secs())?;
    writeln!(out, "{:<16} {}s", "sweep interval:", config.sweep_interval.as_secs())?;

    let configured: Vec<Provider> = config.provider_keys.configured().collect();
    for provider in Provider::ALL {
        let key = if configured.contains(&provider) {
            "server key"
        } else {
            "client key only"
        };
        writeln!(out, "{:<16} {key}", format!("{provider}:"))?;
    }
    Ok(out)
}
