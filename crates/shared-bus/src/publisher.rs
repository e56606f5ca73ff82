//! # Message Publisher
//!
//! Defines the publishing side of the transport and the in-memory bus that
//! implements both sides.

use crate::subscriber::{MessageStream, MessageSubscriber, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Errors from publish operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The transport has been closed and accepts no more messages.
    #[error("Transport closed")]
    Closed,

    /// The transport refused the message.
    #[error("Message rejected: {0}")]
    Rejected(String),
}

/// Trait for publishing messages to the transport.
///
/// Delivery is best effort: a successful publish means the message was
/// accepted, not that anybody processed it.
#[async_trait]
pub trait MessagePublisher<M>: Send + Sync {
    /// Publish a message to all current subscribers.
    ///
    /// # Returns
    ///
    /// The number of subscribers the message was handed to. Zero is a
    /// success: nobody was listening.
    ///
    /// # Errors
    ///
    /// `PublishError` if the message was not accepted for delivery.
    async fn publish(&self, message: M) -> Result<usize, PublishError>;
}

/// In-memory implementation of the transport.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer fan-out.
/// Each subscriber sees every message published after it subscribed; there
/// is no replay of history.
pub struct InMemoryBus<M> {
    /// Channel name, used in logs.
    topic: String,

    /// Broadcast sender. `None` once the bus has been closed.
    sender: RwLock<Option<broadcast::Sender<M>>>,

    /// Total messages accepted.
    messages_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl<M: Clone + Send + 'static> InMemoryBus<M> {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self::with_capacity(topic, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    ///
    /// # Panics
    ///
    /// If `capacity` is zero.
    #[must_use]
    pub fn with_capacity(topic: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            topic: topic.into(),
            sender: RwLock::new(Some(sender)),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Open a subscription receiving every message published from now on.
    ///
    /// Subscribing to a closed bus yields a subscription that is already
    /// at end of stream.
    #[must_use]
    pub fn subscription(&self) -> Subscription<M> {
        let receiver = match self.sender.read().as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        };

        debug!(topic = %self.topic, "New subscription created");

        Subscription::new(receiver, self.topic.clone())
    }

    /// Close the bus.
    ///
    /// Subsequent publishes fail with [`PublishError::Closed`]; live
    /// subscriptions drain what is buffered and then end.
    pub fn close(&self) {
        if self.sender.write().take().is_some() {
            debug!(topic = %self.topic, "Bus closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Get the total number of messages accepted for delivery.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the channel name.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl<M> MessagePublisher<M> for InMemoryBus<M>
where
    M: Clone + Send + Sync + 'static,
{
    async fn publish(&self, message: M) -> Result<usize, PublishError> {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            warn!(topic = %self.topic, "Publish rejected (bus closed)");
            return Err(PublishError::Closed);
        };

        self.messages_published.fetch_add(1, Ordering::Relaxed);

        match sender.send(message) {
            Ok(receivers) => {
                debug!(topic = %self.topic, receivers, "Message published");
                Ok(receivers)
            }
            Err(_) => {
                // No receivers - message is dropped
                debug!(topic = %self.topic, "Message dropped (no receivers)");
                Ok(0)
            }
        }
    }
}

impl<M> MessageSubscriber<M> for InMemoryBus<M>
where
    M: Clone + Send + Sync + 'static,
{
    fn subscribe(&self) -> MessageStream<M> {
        MessageStream::from_subscription(self.subscription())
    }
}

impl<M: Clone + Send + 'static> Default for InMemoryBus<M> {
    fn default() -> Self {
        Self::new("default")
    }
}
