//! # Shared Types Crate
//!
//! Types shared by every participant of a request/reply exchange: the
//! transport, the correlation engine, and the message definitions of the
//! host application.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `CorrelationId` is defined once, here.
//! - **Compile-Time Capability**: a message type takes part in correlation
//!   only by implementing [`Correlated`]; there is no runtime field lookup.

pub mod correlation;
pub mod message;

pub use correlation::CorrelationId;
pub use message::Correlated;
