//! OpenAI-compatible upstream for llm-relay.
//!
//! Implements [`relay_core::ModelInvoker`] against any provider that speaks
//! the `/chat/completions` wire format, streaming or not. Cancellation is
//! observed between network reads, so an abort returns the partial round
//! accumulated so far.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod convert;
pub mod error;
pub mod invoker;
pub mod models;
pub mod stream;

pub use error::UpstreamError;
pub use invoker::{DEFAULT_CONNECT_TIMEOUT, OpenAiCompatInvoker};

// Silence unused dev-dependency warnings; used by integration tests
#[cfg(test)]
use axum as _;
#[cfg(test)]
use tokio_test as _;
