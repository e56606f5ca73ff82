//! # Replier
//!
//! Answers correlated requests with a user-supplied handler.
//!
//! Each inbound request is passed to the handler; the reply it returns is
//! stamped with the request's correlation ID and published. Failures are
//! reported to the [`FailureSink`] and never end the subscription: one bad
//! request costs one reply, nothing more.

use crate::config::{DispatchMode, ReplierConfig};
use crate::domain::stats::incr;
use crate::domain::{HandlerFailure, ReplierStats, ReplierStatsSnapshot};
use crate::ports::{FailureSink, LoggingFailureSink};
use futures::StreamExt;
use shared_bus::{MessagePublisher, MessageStream, MessageSubscriber};
use shared_types::Correlated;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Reply side of the request/reply pattern.
pub struct Replier<Req, Rep> {
    requests: Arc<dyn MessageSubscriber<Req>>,
    publisher: Arc<dyn MessagePublisher<Rep>>,
    config: ReplierConfig,
    failure_sink: Arc<dyn FailureSink>,
    stats: Arc<ReplierStats>,
}

impl<Req, Rep> Replier<Req, Rep>
where
    Req: Correlated + Send + 'static,
    Rep: Correlated + Send + 'static,
{
    /// Create a replier reading `requests` and publishing to `publisher`.
    ///
    /// Failures go to a [`LoggingFailureSink`] until
    /// [`with_failure_sink`](Self::with_failure_sink) replaces it.
    pub fn new(
        requests: Arc<dyn MessageSubscriber<Req>>,
        publisher: Arc<dyn MessagePublisher<Rep>>,
        config: ReplierConfig,
    ) -> Self {
        Self {
            requests,
            publisher,
            config,
            failure_sink: Arc::new(LoggingFailureSink),
            stats: Arc::new(ReplierStats::default()),
        }
    }

    /// Replace the failure sink.
    #[must_use]
    pub fn with_failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.failure_sink = sink;
        self
    }

    /// Start answering requests with `handler`.
    ///
    /// The request subscription is open when this returns. Handling stops
    /// when the returned [`ReplierSubscription`] is disposed or dropped, or
    /// when the request stream ends.
    ///
    /// Calling this more than once attaches independent handlers; each
    /// sees every request.
    ///
    /// # Panics
    ///
    /// If called outside a Tokio runtime.
    pub fn subscribe_requests<F, E>(&self, handler: F) -> ReplierSubscription
    where
        F: Fn(Req) -> Result<Rep, E> + Send + Sync + 'static,
        E: fmt::Display + Send + 'static,
    {
        let requests = self.requests.subscribe();
        let token = CancellationToken::new();
        let responder = Arc::new(Responder {
            handler,
            publisher: self.publisher.clone(),
            failure_sink: self.failure_sink.clone(),
            stats: self.stats.clone(),
        });

        let task = tokio::spawn(dispatch_requests(
            requests,
            responder,
            self.config.dispatch,
            token.clone(),
        ));

        ReplierSubscription {
            token,
            task: Some(task),
        }
    }

    /// Current counters, summed over every subscription.
    #[must_use]
    pub fn stats(&self) -> ReplierStatsSnapshot {
        self.stats.snapshot()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ReplierConfig {
        &self.config
    }
}

/// A running handler attachment.
///
/// Dropping it stops request handling; [`dispose`](Self::dispose) also
/// waits for the dispatch task to finish.
#[must_use = "dropping the subscription stops handling requests"]
#[derive(Debug)]
pub struct ReplierSubscription {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ReplierSubscription {
    /// Stop handling requests and wait until no handler is running.
    pub async fn dispose(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Stop handling requests without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether requests are still being handled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ReplierSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Everything one subscription needs to answer a request.
struct Responder<F, Rep> {
    handler: F,
    publisher: Arc<dyn MessagePublisher<Rep>>,
    failure_sink: Arc<dyn FailureSink>,
    stats: Arc<ReplierStats>,
}

impl<F, Rep> Responder<F, Rep>
where
    Rep: Correlated + Send + 'static,
{
    #[instrument(name = "reply", skip_all, fields(correlation_id))]
    async fn answer<Req, E>(&self, request: Req)
    where
        Req: Correlated,
        F: Fn(Req) -> Result<Rep, E>,
        E: fmt::Display,
    {
        incr(&self.stats.received);

        let Some(correlation_id) = request.correlation_id() else {
            self.fail(HandlerFailure::MissingCorrelationId);
            return;
        };
        tracing::Span::current().record("correlation_id", tracing::field::display(correlation_id));

        let mut reply = match panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(request))) {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                self.fail(HandlerFailure::Handler {
                    correlation_id,
                    message: err.to_string(),
                });
                return;
            }
            Err(payload) => {
                self.fail(HandlerFailure::Panicked {
                    correlation_id,
                    message: panic_message(payload.as_ref()),
                });
                return;
            }
        };
        reply.set_correlation_id(correlation_id);

        match self.publisher.publish(reply).await {
            Ok(_) => {
                incr(&self.stats.replied);
                debug!("Reply published");
            }
            Err(source) => self.fail(HandlerFailure::Publish {
                correlation_id,
                source,
            }),
        }
    }

    fn fail(&self, failure: HandlerFailure) {
        incr(&self.stats.failed);
        self.failure_sink.report(&failure);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

async fn dispatch_requests<Req, Rep, F, E>(
    mut requests: MessageStream<Req>,
    responder: Arc<Responder<F, Rep>>,
    mode: DispatchMode,
    token: CancellationToken,
) where
    Req: Correlated + Send + 'static,
    Rep: Correlated + Send + 'static,
    F: Fn(Req) -> Result<Rep, E> + Send + Sync + 'static,
    E: fmt::Display + Send + 'static,
{
    let mut in_flight = JoinSet::new();
    debug!(%mode, "Replier subscription started");

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            next = requests.next() => match next {
                Some(request) => match mode {
                    DispatchMode::Sequential => responder.answer(request).await,
                    DispatchMode::Concurrent => {
                        let responder = responder.clone();
                        in_flight.spawn(async move { responder.answer(request).await });
                    }
                },
                None => {
                    debug!("Request stream ended");
                    break;
                }
            },
        }
    }

    if token.is_cancelled() {
        in_flight.shutdown().await;
    } else {
        while in_flight.join_next().await.is_some() {}
    }
    debug!("Replier subscription stopped");
}
