//! # Inbound Port - RequesterApi
//!
//! The driving port callers use to issue correlated requests. Lets host
//! code depend on the capability instead of the concrete `Requester`.

use crate::domain::RequestError;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Request/reply over a one-way transport.
///
/// # Example
///
/// ```rust,ignore
/// use reqrep_core::ports::RequesterApi;
///
/// async fn greet(requester: &dyn RequesterApi<Greeting, Answer>) {
///     let answer = requester
///         .request_with_timeout(Greeting::new("Hello"), Duration::from_secs(1))
///         .await?;
/// }
/// ```
#[async_trait]
pub trait RequesterApi<Req, Rep>: Send + Sync
where
    Req: Send + 'static,
    Rep: Send + 'static,
{
    /// Publish `message` and wait for the reply carrying its correlation ID.
    ///
    /// # Errors
    ///
    /// - `Cancelled`: `cancellation` fired (or the requester shut down)
    ///   before a reply arrived
    /// - `PublishFailure`: the transport refused the request
    /// - `RegistrationConflict`: identifier generation is broken
    async fn request(
        &self,
        message: Req,
        cancellation: Option<CancellationToken>,
    ) -> Result<Rep, RequestError>;

    /// [`request`](Self::request) with a cancellation that fires after
    /// `timeout`.
    async fn request_with_timeout(&self, message: Req, timeout: Duration) -> Result<Rep, RequestError> {
        let token = CancellationToken::new();
        let mut pending = self.request(message, Some(token.clone()));

        tokio::select! {
            result = &mut pending => result,
            () = tokio::time::sleep(timeout) => {
                token.cancel();
                pending.await
            }
        }
    }
}
