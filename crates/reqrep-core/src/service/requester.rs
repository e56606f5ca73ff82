//! # Requester
//!
//! Issues correlated requests and matches inbound replies to the callers
//! waiting for them.
//!
//! ## Request Flow
//!
//! 1. Generate a `CorrelationId` and write it into the request
//! 2. Register a completion handle in the pending table
//! 3. Publish the request (roll the registration back if that fails)
//! 4. Await the handle, the caller's cancellation, or the deadline
//! 5. Withdraw the registration on every exit path
//!
//! A single reply-observation task, started in [`Requester::new`], feeds
//! every inbound reply through [`PendingRequestTable::resolve`].
//!
//! ## Races
//!
//! | Race | Winner |
//! |------|--------|
//! | reply vs cancellation | whichever removes the pending entry first |
//! | reply before registration | neither: registration precedes publish |
//! | request vs shutdown | shutdown; the request resolves `Cancelled` |

use crate::config::RequesterConfig;
use crate::domain::stats::incr;
use crate::domain::{
    CompletionHandle, PendingRequestTable, RequestError, RequestStats, RequestStatsSnapshot,
    ResolveOutcome,
};
use crate::ports::RequesterApi;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use shared_bus::{MessagePublisher, MessageStream, MessageSubscriber};
use shared_types::{Correlated, CorrelationId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

/// Request side of the request/reply pattern.
///
/// Safe to share between tasks (`Arc<Requester<..>>`); every `request` call
/// gets its own correlation ID and completion handle, and no call blocks
/// another.
///
/// Dropping the requester stops the reply observer, which cancels every
/// request still waiting.
pub struct Requester<Req, Rep> {
    /// Request channel.
    publisher: Arc<dyn MessagePublisher<Req>>,
    /// Pending requests by correlation ID.
    pending: Arc<PendingRequestTable<Rep>>,
    /// Counters.
    stats: Arc<RequestStats>,
    /// Configuration.
    config: RequesterConfig,
    /// Stops the reply observer.
    shutdown: CancellationToken,
    /// Reply observer task.
    observer: Mutex<Option<JoinHandle<()>>>,
}

impl<Req, Rep> Requester<Req, Rep>
where
    Req: Correlated + Send + 'static,
    Rep: Correlated + Send + 'static,
{
    /// Create a requester and start observing `replies`.
    ///
    /// The reply subscription is opened before this returns, so no reply to
    /// a request issued afterwards can be missed.
    ///
    /// # Panics
    ///
    /// If called outside a Tokio runtime.
    pub fn new(
        publisher: Arc<dyn MessagePublisher<Req>>,
        replies: &dyn MessageSubscriber<Rep>,
        config: RequesterConfig,
    ) -> Self {
        let pending = Arc::new(PendingRequestTable::new());
        let stats = Arc::new(RequestStats::default());
        let shutdown = CancellationToken::new();

        let observer = tokio::spawn(observe_replies(
            replies.subscribe(),
            pending.clone(),
            stats.clone(),
            shutdown.clone(),
        ));

        Self {
            publisher,
            pending,
            stats,
            config,
            shutdown,
            observer: Mutex::new(Some(observer)),
        }
    }

    /// Publish `message` and wait for its reply.
    ///
    /// Without a `cancellation` token the configured `request_timeout` (if
    /// any) bounds the wait. A token that has already fired cancels the call
    /// before anything is registered or published.
    ///
    /// # Errors
    ///
    /// - `Cancelled`: the token fired, the deadline passed, or the requester
    ///   shut down before a reply arrived
    /// - `PublishFailure`: the transport refused the request
    /// - `RegistrationConflict`: identifier generation is broken
    pub async fn request(
        &self,
        message: Req,
        cancellation: Option<CancellationToken>,
    ) -> Result<Rep, RequestError> {
        let timeout = match cancellation {
            Some(_) => None,
            None => self.config.request_timeout,
        };
        self.exchange(message, cancellation, timeout).await
    }

    /// Publish `message` and wait at most `timeout` for its reply.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request); a timeout surfaces as `Cancelled`.
    pub async fn request_with_timeout(
        &self,
        message: Req,
        timeout: Duration,
    ) -> Result<Rep, RequestError> {
        self.exchange(message, None, Some(timeout)).await
    }

    /// Stop observing replies and cancel every outstanding request.
    ///
    /// Requests issued afterwards fail with `Cancelled` without being
    /// published.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let observer = self.observer.lock().take();
        if let Some(observer) = observer {
            let _ = observer.await;
        }
    }

    /// Whether [`shutdown`](Self::shutdown) ran or the reply stream ended.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of requests waiting for a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a request with `id` is waiting for a reply.
    #[must_use]
    pub fn is_pending(&self, id: &CorrelationId) -> bool {
        self.pending.contains(id)
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> RequestStatsSnapshot {
        self.stats.snapshot()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RequesterConfig {
        &self.config
    }

    #[instrument(name = "request", skip_all, fields(correlation_id))]
    async fn exchange(
        &self,
        mut message: Req,
        cancellation: Option<CancellationToken>,
        timeout: Option<Duration>,
    ) -> Result<Rep, RequestError> {
        let id = CorrelationId::new();
        tracing::Span::current().record("correlation_id", tracing::field::display(id));
        message.set_correlation_id(id);

        if cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) || self.is_shut_down() {
            debug!("Request cancelled before registration");
            return Err(RequestError::Cancelled(id));
        }

        let (handle, mut completion) = CompletionHandle::new();
        if let Err(err) = self.pending.insert_if_absent(id, handle) {
            error!(correlation_id = %id, "Generated correlation id is already pending");
            return Err(err);
        }
        let registration = Registration {
            pending: &self.pending,
            stats: &self.stats,
            id,
        };
        incr(&self.stats.registered);
        debug!("Registered pending request");

        // The observer may have drained the table between the check above
        // and the insert
        if self.is_shut_down() {
            if registration.withdraw() {
                incr(&self.stats.cancelled);
            }
            return Err(RequestError::Cancelled(id));
        }

        if let Err(err) = self.publisher.publish(message).await {
            registration.withdraw();
            incr(&self.stats.publish_failures);
            warn!(error = %err, "Request publish failed, registration rolled back");
            return Err(err.into());
        }
        debug!("Request published");

        let cancelled = async {
            match &cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            outcome = &mut completion => return self.settle(id, outcome),
            () = cancelled => debug!("Cancellation fired"),
            () = deadline => debug!("Request deadline passed"),
        }

        if registration.withdraw() {
            incr(&self.stats.cancelled);
            return Err(RequestError::Cancelled(id));
        }

        // A reply removed the entry first; its value is already in flight
        self.settle(id, completion.await)
    }

    fn settle(&self, id: CorrelationId, outcome: Option<Rep>) -> Result<Rep, RequestError> {
        match outcome {
            Some(reply) => {
                incr(&self.stats.completed);
                debug!("Request completed");
                Ok(reply)
            }
            None => {
                incr(&self.stats.cancelled);
                debug!("Request cancelled by shutdown");
                Err(RequestError::Cancelled(id))
            }
        }
    }
}

impl<Req, Rep> Drop for Requester<Req, Rep> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl<Req, Rep> RequesterApi<Req, Rep> for Requester<Req, Rep>
where
    Req: Correlated + Send + 'static,
    Rep: Correlated + Send + 'static,
{
    async fn request(
        &self,
        message: Req,
        cancellation: Option<CancellationToken>,
    ) -> Result<Rep, RequestError> {
        Requester::request(self, message, cancellation).await
    }

    async fn request_with_timeout(
        &self,
        message: Req,
        timeout: Duration,
    ) -> Result<Rep, RequestError> {
        Requester::request_with_timeout(self, message, timeout).await
    }
}

/// A request's claim on its pending-table entry.
///
/// Withdrawing removes the entry and cancels its handle if no reply got
/// there first. Dropping withdraws, which covers request futures that are
/// dropped mid-flight.
struct Registration<'a, T> {
    pending: &'a PendingRequestTable<T>,
    stats: &'a RequestStats,
    id: CorrelationId,
}

impl<T> Registration<'_, T> {
    /// Returns `true` if this call cancelled the handle.
    fn withdraw(&self) -> bool {
        self.pending
            .remove(&self.id)
            .is_some_and(|entry| entry.handle().cancel())
    }
}

impl<T> Drop for Registration<'_, T> {
    fn drop(&mut self) {
        if self.withdraw() {
            incr(&self.stats.cancelled);
            debug!(correlation_id = %self.id, "Request abandoned before a reply arrived");
        }
    }
}

/// Route every inbound reply to its pending request until shutdown or end
/// of stream, then cancel whatever is still pending.
async fn observe_replies<Rep>(
    mut replies: MessageStream<Rep>,
    pending: Arc<PendingRequestTable<Rep>>,
    stats: Arc<RequestStats>,
    shutdown: CancellationToken,
) where
    Rep: Correlated + Send + 'static,
{
    debug!("Reply observer started");

    loop {
        let reply = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            next = replies.next() => match next {
                Some(reply) => reply,
                None => {
                    warn!("Reply stream ended, shutting down requester");
                    break;
                }
            },
        };
        route_reply(&pending, &stats, reply);
    }

    shutdown.cancel();
    let cancelled = pending.cancel_all();
    debug!(cancelled, "Reply observer stopped");
}

fn route_reply<Rep: Correlated>(pending: &PendingRequestTable<Rep>, stats: &RequestStats, reply: Rep) {
    let Some(id) = reply.correlation_id() else {
        incr(&stats.unmatched_replies);
        debug!("Dropping reply without correlation id");
        return;
    };

    match pending.resolve(&id, reply) {
        ResolveOutcome::Resolved => {
            debug!(correlation_id = %id, "Reply matched pending request");
        }
        ResolveOutcome::Unmatched | ResolveOutcome::AlreadySettled => {
            incr(&stats.unmatched_replies);
            debug!(correlation_id = %id, "Dropping unmatched reply");
        }
    }
}
