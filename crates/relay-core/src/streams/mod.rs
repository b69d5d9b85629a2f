//! Registry of in-flight invocations.
//!
//! Every round registers a cancellation token under its stream id before
//! the first provider call and removes it when the round ends, however it
//! ends. Aborting a stream is cancelling its token.

mod registry;

pub use registry::{RegistryError, StreamGuard, StreamRegistry};
