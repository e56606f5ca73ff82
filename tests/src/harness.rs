//! # Test Harness
//!
//! Message types, transports and sinks shared by the integration suite and
//! the benchmarks.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqrep_core::{
    FailureSink, HandlerFailure, Replier, ReplierConfig, ReplierSubscription, Requester,
    RequesterConfig,
};
use shared_bus::{InMemoryBus, MessagePublisher, PublishError};
use shared_types::{impl_correlated, CorrelationId};
use std::sync::Arc;
use std::time::Duration;

/// Request message used throughout the suite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRequest {
    pub correlation_id: Option<CorrelationId>,
    pub text: String,
}

impl TextRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            correlation_id: None,
            text: text.into(),
        }
    }
}

impl_correlated!(TextRequest, correlation_id);

/// Reply message used throughout the suite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextReply {
    pub correlation_id: Option<CorrelationId>,
    pub text: String,
}

impl TextReply {
    pub fn answering(request: &TextRequest) -> Self {
        Self {
            correlation_id: request.correlation_id,
            text: format!("Reply to {}", request.text),
        }
    }
}

impl_correlated!(TextReply, correlation_id);

/// Handler that answers everything except `"bad"`.
pub fn reply_to(request: TextRequest) -> Result<TextReply, String> {
    if request.text == "bad" {
        return Err(format!("cannot handle {:?}", request.text));
    }
    Ok(TextReply {
        correlation_id: None,
        text: format!("Reply to {}", request.text),
    })
}

/// A requester wired to a pair of in-memory buses.
pub struct Rig {
    pub requests: Arc<InMemoryBus<TextRequest>>,
    pub replies: Arc<InMemoryBus<TextReply>>,
    pub requester: Arc<Requester<TextRequest, TextReply>>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(RequesterConfig::default())
    }

    pub fn with_config(config: RequesterConfig) -> Self {
        let requests = Arc::new(InMemoryBus::new("requests"));
        let replies = Arc::new(InMemoryBus::new("replies"));
        let requester = Arc::new(Requester::new(requests.clone(), &*replies, config));
        Self {
            requests,
            replies,
            requester,
        }
    }

    /// Attach a replier running [`reply_to`], reporting into `sink`.
    pub fn serve(&self, config: ReplierConfig, sink: Arc<RecordingSink>) -> (Replier<TextRequest, TextReply>, ReplierSubscription) {
        let replier = Replier::new(self.requests.clone(), self.replies.clone(), config).with_failure_sink(sink);
        let subscription = replier.subscribe_requests(reply_to);
        (replier, subscription)
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure sink that keeps every report.
#[derive(Debug, Default)]
pub struct RecordingSink {
    failures: Mutex<Vec<HandlerFailure>>,
}

impl RecordingSink {
    pub fn failures(&self) -> Vec<HandlerFailure> {
        self.failures.lock().clone()
    }
}

impl FailureSink for RecordingSink {
    fn report(&self, failure: &HandlerFailure) {
        self.failures.lock().push(failure.clone());
    }
}

/// Transport that refuses every message.
#[derive(Debug, Default)]
pub struct RejectingPublisher;

#[async_trait]
impl<M: Send + 'static> MessagePublisher<M> for RejectingPublisher {
    async fn publish(&self, _message: M) -> Result<usize, PublishError> {
        Err(PublishError::Rejected("transport offline".to_string()))
    }
}

/// Poll `condition` until it holds, panicking after one second.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition never held");
}
