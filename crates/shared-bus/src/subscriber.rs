//! # Message Subscriber
//!
//! Defines the subscription side of the transport.

use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The transport was closed.
    #[error("Transport closed")]
    Closed,
}

/// Trait for subscribing to messages from the transport.
///
/// Every call opens an independent view of all messages published after the
/// call; dropping the returned stream releases the subscription.
pub trait MessageSubscriber<M>: Send + Sync {
    /// Open a new lazy, unbounded stream of inbound messages.
    fn subscribe(&self) -> MessageStream<M>;
}

/// A subscription handle for receiving messages from an in-memory bus.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription<M> {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<M>,

    /// Channel name, used in logs.
    topic: String,
}

impl<M: Clone> Subscription<M> {
    pub(crate) fn new(receiver: broadcast::Receiver<M>, topic: String) -> Self {
        Self { receiver, topic }
    }

    /// Receive the next message.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next message
    /// - `None` - The bus was closed or dropped
    pub async fn recv(&mut self) -> Option<M> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(topic = %self.topic, lagged = count, "Subscriber lagged, some messages dropped");
                }
            }
        }
    }

    /// Try to receive the next message without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available
    /// - `Ok(None)` - No message available (would block)
    /// - `Err(SubscriptionError::Closed)` - The bus was closed
    pub fn try_recv(&mut self) -> Result<Option<M>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Ok(Some(message)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    /// Get the channel name.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// A boxed stream of inbound messages.
///
/// Transports other than [`InMemoryBus`](crate::InMemoryBus) build one with
/// [`MessageStream::new`] from any `Send` stream.
pub struct MessageStream<M> {
    inner: Pin<Box<dyn Stream<Item = M> + Send>>,
}

impl<M: 'static> MessageStream<M> {
    /// Wrap an arbitrary stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = M> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// A stream that ends immediately.
    #[must_use]
    pub fn empty() -> Self
    where
        M: Send,
    {
        Self::new(futures::stream::empty())
    }
}

impl<M: Clone + Send + 'static> MessageStream<M> {
    /// Convert an in-memory subscription into a stream.
    ///
    /// Lagged gaps are skipped with a debug log.
    #[must_use]
    pub fn from_subscription(subscription: Subscription<M>) -> Self {
        let Subscription { receiver, topic } = subscription;

        let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(message) => Some(message),
            Err(BroadcastStreamRecvError::Lagged(count)) => {
                debug!(topic = %topic, lagged = count, "Stream lagged, some messages dropped");
                None
            }
        });

        Self::new(stream)
    }
}

impl<M> Stream for MessageStream<M> {
    type Item = M;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<M> fmt::Debug for MessageStream<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageStream").finish_non_exhaustive()
    }
}
