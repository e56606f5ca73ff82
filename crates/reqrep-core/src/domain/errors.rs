//! Correlation engine error types.

use shared_bus::PublishError;
use shared_types::CorrelationId;
use thiserror::Error;

/// Outcome of a `request` call that did not produce a reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The freshly generated correlation ID was already registered.
    ///
    /// Indicates a defect in identifier generation, never a transient
    /// condition.
    #[error("correlation id {0} is already registered")]
    RegistrationConflict(CorrelationId),

    /// The transport did not accept the request. Nothing stays registered.
    #[error("failed to publish request: {0}")]
    PublishFailure(#[from] PublishError),

    /// Cancellation, timeout or requester shutdown won before a reply.
    #[error("request {0} cancelled before a reply arrived")]
    Cancelled(CorrelationId),
}

impl RequestError {
    /// Whether the error reveals a bug rather than a runtime condition.
    #[must_use]
    pub fn is_bug(&self) -> bool {
        matches!(self, Self::RegistrationConflict(_))
    }

    /// Whether resending the request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The correlation ID involved, when one was assigned.
    #[must_use]
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            Self::RegistrationConflict(id) | Self::Cancelled(id) => Some(*id),
            Self::PublishFailure(_) => None,
        }
    }
}

/// A request the replier could not answer.
///
/// Reported to the replier's failure sink; never propagated to the
/// subscription.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerFailure {
    /// The handler returned an error.
    #[error("handler failed for request {correlation_id}: {message}")]
    Handler {
        correlation_id: CorrelationId,
        message: String,
    },

    /// The handler panicked.
    #[error("handler panicked for request {correlation_id}: {message}")]
    Panicked {
        correlation_id: CorrelationId,
        message: String,
    },

    /// The request carried no correlation ID, so no reply could be matched.
    #[error("request has no correlation id")]
    MissingCorrelationId,

    /// The reply was produced but the transport refused it.
    #[error("failed to publish reply for request {correlation_id}: {source}")]
    Publish {
        correlation_id: CorrelationId,
        #[source]
        source: PublishError,
    },
}

impl HandlerFailure {
    /// The correlation ID of the failed request, if it had one.
    #[must_use]
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            Self::Handler { correlation_id, .. }
            | Self::Panicked { correlation_id, .. }
            | Self::Publish { correlation_id, .. } => Some(*correlation_id),
            Self::MissingCorrelationId => None,
        }
    }
}
