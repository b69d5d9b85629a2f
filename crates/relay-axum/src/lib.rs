//! Axum HTTP/SSE adapter for llm-relay.
//!
//! Routes (all `/api/*` routes behind the optional bearer gate):
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /health` | liveness, always public |
//! | `POST /api/v1/stream` | start a round, SSE response |
//! | `POST /api/v1/stream/continue` | resume a session with tool results, SSE response |
//! | `POST /api/v1/stream/{streamId}/abort` | cancel an in-flight round |
//! | `GET /api/v1/sessions/{sessionId}` | redacted session summary |
//! | `DELETE /api/v1/sessions/{sessionId}` | drop a session |
//! | `GET /api/v1/stats` | live session and stream counts |
//! | `POST /api/v1/complete` | non-streaming completion |

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings; used by integration tests
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tower as _;

pub mod auth;
pub mod bootstrap;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

// Re-export primary types
pub use bootstrap::{
    AxumContext, ConfigError, CorsConfig, ServerConfig, bootstrap, bootstrap_with_clock,
    start_server,
};
pub use error::HttpError;
pub use routes::create_router;
pub use state::AppState;
