//! # Demo Exchange
//!
//! Wires a requester and a replier over two in-memory buses and sends the
//! greeting messages through them.
//!
//! ```text
//! Requester ──DemoRequest──▶ [requests bus] ──▶ Replier (answer)
//!     ▲                                            │
//!     └───────DemoReply──── [replies bus] ◀────────┘
//! ```

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use reqrep_core::{Replier, Requester};
use serde::{Deserialize, Serialize};
use shared_bus::InMemoryBus;
use shared_types::{impl_correlated, CorrelationId};
use std::sync::Arc;
use tracing::info;

/// Messages the demo sends, in order.
pub const DEMO_MESSAGES: [&str; 2] = ["Hello", "How are you"];

/// Request carrying a line of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoRequest {
    pub correlation_id: Option<CorrelationId>,
    pub message: String,
}

impl DemoRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            correlation_id: None,
            message: message.into(),
        }
    }
}

impl_correlated!(DemoRequest, correlation_id);

/// Reply carrying the answer text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoReply {
    pub correlation_id: Option<CorrelationId>,
    pub message: String,
}

impl_correlated!(DemoReply, correlation_id);

/// The demo replier's handler.
///
/// # Errors
///
/// Blank messages are refused.
pub fn answer(request: DemoRequest) -> Result<DemoReply, String> {
    if request.message.trim().is_empty() {
        return Err("refusing to answer a blank message".to_string());
    }
    Ok(DemoReply {
        correlation_id: None,
        message: format!("Reply to {}", request.message),
    })
}

/// Run the demo exchange and return the reply texts in request order.
///
/// # Errors
///
/// If the configuration is invalid or any request fails.
pub async fn run_demo(config: &NodeConfig) -> Result<Vec<String>> {
    config.validate()?;

    let requests = Arc::new(InMemoryBus::<DemoRequest>::with_capacity("requests", config.bus_capacity));
    let replies = Arc::new(InMemoryBus::<DemoReply>::with_capacity("replies", config.bus_capacity));

    let replier = Replier::new(requests.clone(), replies.clone(), config.replier.clone());
    let subscription = replier.subscribe_requests(answer);

    let requester = Requester::new(requests, &*replies, config.requester.clone());

    let mut answers = Vec::with_capacity(DEMO_MESSAGES.len());
    for message in DEMO_MESSAGES {
        let reply = requester
            .request(DemoRequest::new(message), None)
            .await
            .with_context(|| format!("request {message:?} failed"))?;
        info!(request = message, reply = %reply.message, "Received reply");
        answers.push(reply.message);
    }

    subscription.dispose().await;
    requester.shutdown().await;

    let stats = requester.stats();
    info!(
        completed = stats.completed,
        unmatched = stats.unmatched_replies,
        replied = replier.stats().replied,
        "Demo exchange finished"
    );

    Ok(answers)
}
