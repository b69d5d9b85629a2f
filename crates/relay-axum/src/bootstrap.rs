//! Axum server bootstrap - the composition root.
//!
//! This module is the ONLY place where the relay is wired together for the
//! HTTP adapter. The stores, the driver and the coordinator are instantiated
//! here and handed to the router as shared state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use relay_core::{
    Clock, DEFAULT_SESSION_TTL, DEFAULT_SWEEP_INTERVAL, ModelInvoker, ProviderKeys, SessionStore,
    StreamRegistry, SystemClock,
};
use relay_stream::{ContinuationCoordinator, StreamDriver};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8787;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Invalid environment configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be greater than zero")]
    ZeroDuration { var: &'static str },
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for the HTTP server.
    pub host: String,
    /// Port for the HTTP server.
    pub port: u16,
    /// Static bearer token. `None` disables the gate.
    pub auth_token: Option<String>,
    /// CORS configuration.
    pub cors: CorsConfig,
    /// Sliding TTL of suspended sessions.
    pub session_ttl: Duration,
    /// Interval of the expired-session sweep.
    pub sweep_interval: Duration,
    /// Server-side fallback credentials and base URL overrides.
    pub provider_keys: ProviderKeys,
}

impl ServerConfig {
    /// Create config with defaults and no fallback credentials.
    pub fn with_defaults() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            auth_token: None,
            cors: CorsConfig::default(),
            session_ttl: DEFAULT_SESSION_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            provider_keys: ProviderKeys::new(),
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through a variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::with_defaults();

        if let Some(host) = get("RELAY_HOST") {
            config.host = host.trim().to_string();
        }
        if let Some(port) = get("RELAY_PORT") {
            config.port = parse_number("RELAY_PORT", &port)?;
        }
        config.auth_token = get("RELAY_AUTH_TOKEN").map(|t| t.trim().to_string());
        if let Some(origins) = get("RELAY_CORS_ORIGINS") {
            config.cors = CorsConfig::AllowOrigins(
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect(),
            );
        }
        if let Some(ttl) = get("RELAY_SESSION_TTL_SECS") {
            config.session_ttl = parse_secs("RELAY_SESSION_TTL_SECS", &ttl)?;
        }
        if let Some(interval) = get("RELAY_SWEEP_INTERVAL_SECS") {
            config.sweep_interval = parse_secs("RELAY_SWEEP_INTERVAL_SECS", &interval)?;
        }
        config.provider_keys = ProviderKeys::from_lookup(&lookup);
        Ok(config)
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Require `Authorization: Bearer {token}` on `/api/*`.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }

    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_provider_keys(mut self, keys: ProviderKeys) -> Self {
        self.provider_keys = keys;
        self
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}

fn parse_secs(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_number(var, value)?;
    if secs == 0 {
        return Err(ConfigError::ZeroDuration { var });
    }
    Ok(Duration::from_secs(secs))
}

/// Application context for the Axum adapter.
///
/// Holds the relay services shared by every handler.
#[derive(Debug, Clone)]
pub struct AxumContext {
    pub driver: Arc<StreamDriver>,
    pub coordinator: ContinuationCoordinator,
    pub sessions: Arc<SessionStore>,
    pub streams: Arc<StreamRegistry>,
}

/// Wire the stores, driver and coordinator around a model invoker.
pub fn bootstrap(config: &ServerConfig, invoker: Arc<dyn ModelInvoker>) -> AxumContext {
    bootstrap_with_clock(config, invoker, Arc::new(SystemClock))
}

/// Same as [`bootstrap`] with an explicit session clock.
pub fn bootstrap_with_clock(
    config: &ServerConfig,
    invoker: Arc<dyn ModelInvoker>,
    clock: Arc<dyn Clock>,
) -> AxumContext {
    let sessions = Arc::new(SessionStore::with_clock(config.session_ttl, clock));
    let streams = Arc::new(StreamRegistry::new());
    let configured: Vec<_> = config.provider_keys.configured().collect();
    info!(
        session_ttl_secs = config.session_ttl.as_secs(),
        fallback_providers = ?configured,
        auth_enabled = config.auth_token.is_some(),
        "Relay bootstrap complete"
    );

    let driver = Arc::new(StreamDriver::new(
        invoker,
        Arc::clone(&sessions),
        Arc::clone(&streams),
        Arc::new(config.provider_keys.clone()),
    ));
    AxumContext {
        coordinator: ContinuationCoordinator::new(Arc::clone(&driver)),
        driver,
        sessions,
        streams,
    }
}

/// Start the web server and run until Ctrl-C.
///
/// The expired-session sweeper runs alongside the server and stops with it.
pub async fn start_server(config: ServerConfig, invoker: Arc<dyn ModelInvoker>) -> Result<()> {
    let ctx = bootstrap(&config, invoker);
    let shutdown = CancellationToken::new();
    let sweeper = ctx
        .sessions
        .spawn_sweeper(config.sweep_interval, shutdown.child_token());

    let app = crate::routes::create_router(ctx, &config);
    let listener = TcpListener::bind(config.bind_address()).await?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("llm-relay listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    sweeper.await?;
    info!("llm-relay stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                return;
            }
            info!("Shutdown requested");
            shutdown.cancel();
        }
        () = shutdown.cancelled() => {}
    }
}
