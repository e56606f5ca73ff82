//! # Outbound Port - FailureSink
//!
//! Where the replier reports requests it could not answer. The default sink
//! logs; callers that want a dead-letter channel install their own.

use crate::domain::HandlerFailure;
use tracing::error;

/// Receives replier-side failures.
///
/// Called on the replier's dispatch task, so implementations must not
/// block.
pub trait FailureSink: Send + Sync {
    /// Report one failed request.
    fn report(&self, failure: &HandlerFailure);
}

/// Logs every failure at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFailureSink;

impl FailureSink for LoggingFailureSink {
    fn report(&self, failure: &HandlerFailure) {
        match failure.correlation_id() {
            Some(correlation_id) => {
                error!(correlation_id = %correlation_id, error = %failure, "Error handling request");
            }
            None => error!(error = %failure, "Error handling request"),
        }
    }
}

impl<F> FailureSink for F
where
    F: Fn(&HandlerFailure) + Send + Sync,
{
    fn report(&self, failure: &HandlerFailure) {
        self(failure);
    }
}
