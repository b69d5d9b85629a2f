//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP client or server types in any signature
//! - Cancellation is cooperative: a `CancellationToken` is passed in, never
//!   enforced from outside
//! - Time is read through [`Clock`] so stores can be tested deterministically

mod clock;
mod invoker;

pub use clock::{Clock, SystemClock};
pub use invoker::{
    InvocationContext, InvocationError, InvocationEvent, InvocationSink, ModelInvoker,
};
