//! # Node Runtime Library
//!
//! Host-side pieces of the demo node, exposed for testing. The main entry
//! point is the `main.rs` binary.
//!
//! - `config` - environment-driven host configuration
//! - `logging` - tracing subscriber installation
//! - `demo` - demo message types and the request/reply exchange

#![warn(clippy::all)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod demo;
pub mod logging;

pub use config::{ConfigError, NodeConfig};
pub use demo::{run_demo, DemoReply, DemoRequest};
pub use logging::init_logging;
