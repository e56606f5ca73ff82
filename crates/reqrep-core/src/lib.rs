//! # Reqrep Core - Request/Reply Correlation Engine
//!
//! Layers request/reply on top of a one-way publish/subscribe transport.
//! Requests and replies travel as independent messages on separate
//! channels; the engine tags each request with a [`CorrelationId`] and
//! routes the reply carrying the same ID back to the caller waiting for it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐                 ┌──────────────────────────┐
//! │        Requester         │                 │         Replier          │
//! │                          │   requests      │                          │
//! │  request() ──publish────────────────────────▶ handler(Req) -> Rep     │
//! │     │                    │                 │        │                 │
//! │     ▼                    │                 │        ▼ copy id         │
//! │  PendingRequestTable     │    replies      │     publish(Rep)         │
//! │  (DashMap<Id, Handle>) ◀──reply observer◀─────────────┘               │
//! └──────────────────────────┘                 └──────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | A handle settles at most once | CAS on [`CompletionHandle`] state |
//! | No entry outlives its request | every exit path removes it; removal is idempotent |
//! | A reply reaches only its own caller | table keyed by correlation ID |
//! | Unknown replies are harmless | dropped, counted, never an error |
//! | One bad request never stops a replier | failures go to a [`FailureSink`] |
//!
//! ## Usage
//!
//! ```ignore
//! use reqrep_core::{Replier, ReplierConfig, Requester, RequesterConfig};
//! use shared_bus::InMemoryBus;
//!
//! let requests = Arc::new(InMemoryBus::new("requests"));
//! let replies = Arc::new(InMemoryBus::new("replies"));
//!
//! let replier = Replier::new(requests.clone(), replies.clone(), ReplierConfig::default());
//! let subscription = replier.subscribe_requests(|req: Greeting| Ok::<_, String>(answer(req)));
//!
//! let requester = Requester::new(requests, &*replies, RequesterConfig::default());
//! let reply = requester.request(Greeting::new("Hello"), None).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::{DispatchMode, ReplierConfig, RequesterConfig};
pub use domain::{
    Completion, CompletionHandle, CompletionState, HandlerFailure, PendingEntry,
    PendingRequestTable, ReplierStatsSnapshot, RequestError, RequestStatsSnapshot,
    ResolveOutcome,
};
pub use ports::{FailureSink, LoggingFailureSink, RequesterApi};
pub use service::{Replier, ReplierSubscription, Requester};

pub use shared_types::{Correlated, CorrelationId};
pub use tokio_util::sync::CancellationToken;
