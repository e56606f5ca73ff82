//! Ports - the abstraction layer between the correlation engine and its
//! callers.
//!
//! The transport ports themselves (`MessagePublisher`, `MessageSubscriber`)
//! live in `shared-bus`.

pub mod inbound;
pub mod outbound;

pub use inbound::RequesterApi;
pub use outbound::{FailureSink, LoggingFailureSink};
