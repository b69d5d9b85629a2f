//! Round execution for llm-relay.
//!
//! [`StreamDriver`] runs one model invocation per round and turns it into an
//! ordered [`StreamEvent`](relay_core::StreamEvent) sequence. A round that
//! stops for tool use suspends into the session store;
//! [`ContinuationCoordinator`] resumes it with the client's tool results.
//!
//! Neither type knows anything about HTTP. Transports consume the returned
//! [`EventStream`] and frame each event however they like.

#![deny(unused_crate_dependencies)]

mod continuation;
mod driver;
mod payload;

pub use continuation::{ContinuationCoordinator, ContinueRequest};
pub use driver::{EventStream, StartRequest, StreamDriver, misrouted_continuation};

// Silence unused dev-dependency warnings for the unit-test build
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tokio_test as _;
