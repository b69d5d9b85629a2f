//! Command-line interface for llm-relay.
//!
//! The `relay` binary loads `.env`, installs the tracing subscriber and
//! dispatches to a subcommand handler.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by main.rs binary
use dotenvy as _;
use tokio as _;
use tracing_subscriber as _;

pub mod commands;
pub mod handlers;
pub mod parser;

// Re-export primary types for convenient access
pub use commands::{Commands, ServeArgs};
pub use parser::Cli;
