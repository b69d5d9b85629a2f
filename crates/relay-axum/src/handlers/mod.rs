//! HTTP request handlers for the Axum web server.
//!
//! Each submodule contains handlers for a specific API area.
//! Handlers are thin wrappers that delegate to the stream driver,
//! the continuation coordinator or the stores.

pub mod complete;
pub mod sessions;
pub mod stats;
pub mod stream;
