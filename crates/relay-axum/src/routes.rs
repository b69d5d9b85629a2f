//! Route definitions and router construction.
//!
//! Handlers delegate to the stream driver, the continuation coordinator and
//! the stores held in [`AppState`].

use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{self, Next};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::validate_bearer;
use crate::bootstrap::{AxumContext, CorsConfig, ServerConfig};
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        }
    }
}

/// Relay routes without the `/api` prefix.
///
/// Returns a router typed as `Router<AppState>` WITHOUT `.with_state()`
/// applied; the caller applies state before nesting.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/stream", post(handlers::stream::start))
        .route(
            "/v1/stream/continue",
            post(handlers::stream::continue_stream),
        )
        .route(
            "/v1/stream/{stream_id}/abort",
            post(handlers::stream::abort),
        )
        .route(
            "/v1/sessions/{session_id}",
            get(handlers::sessions::get).delete(handlers::sessions::remove),
        )
        .route("/v1/stats", get(handlers::stats::get))
        .route("/v1/complete", post(handlers::complete::complete))
}

/// Create the main Axum router.
///
/// `/health` is always public. `/api/*` sits behind the bearer gate when
/// `config.auth_token` is set, and behind CORS in all cases.
///
/// # Path Parameter Syntax
/// Axum 0.8 uses brace syntax for path parameters: `{stream_id}`
pub fn create_router(ctx: AxumContext, config: &ServerConfig) -> Router {
    let state: AppState = Arc::new(ctx);
    let cors = build_cors_layer(&config.cors);

    let mut api = api_routes();
    if let Some(token) = config.auth_token.as_deref() {
        let expected: Arc<str> = Arc::from(format!("Bearer {token}"));
        api = api.route_layer(middleware::from_fn(move |req: Request, next: Next| {
            let expected = Arc::clone(&expected);
            async move { validate_bearer(expected, req, next).await }
        }));
    }

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api.layer(cors))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint.
pub(crate) async fn health_check() -> &'static str {
    "OK"
}
