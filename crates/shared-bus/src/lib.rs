//! # Shared Bus - Publish/Subscribe Transport
//!
//! The one-way, fire-and-forget transport that request/reply correlation is
//! layered on top of.
//!
//! ## Transport Contract
//!
//! - **publish**: hands a message to the transport for delivery to every
//!   current subscriber. Best effort; no ordering guarantees.
//! - **subscribe**: yields a lazy, unbounded, per-subscriber stream of every
//!   message published after the subscription started. No replay.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Requester   │                    │   Replier    │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │ InMemoryBus  │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Out-of-process transports implement [`MessagePublisher`] and
//! [`MessageSubscriber`] themselves; message encoding is their concern.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use publisher::{InMemoryBus, MessagePublisher, PublishError};
pub use subscriber::{MessageStream, MessageSubscriber, Subscription, SubscriptionError};

/// Maximum messages to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
