//! # Correlated Messages
//!
//! The narrow capability every request and reply type exposes so the
//! correlation engine can tag and match it. Payload content is never
//! interpreted; only the correlation field is read and written.

use crate::correlation::CorrelationId;

/// A message carrying a read/write correlation identifier.
///
/// # Contract
///
/// - `correlation_id()` returns `None` until an identifier has been set.
/// - `set_correlation_id()` overwrites any previous value.
/// - Implementations MUST NOT derive the identifier from payload content.
pub trait Correlated {
    /// The correlation identifier, if one has been assigned.
    fn correlation_id(&self) -> Option<CorrelationId>;

    /// Assign the correlation identifier.
    fn set_correlation_id(&mut self, id: CorrelationId);
}

impl<T: Correlated + ?Sized> Correlated for Box<T> {
    fn correlation_id(&self) -> Option<CorrelationId> {
        (**self).correlation_id()
    }

    fn set_correlation_id(&mut self, id: CorrelationId) {
        (**self).set_correlation_id(id);
    }
}

/// Implement [`Correlated`] for a struct holding an
/// `Option<CorrelationId>` field.
///
/// # Example
///
/// ```rust
/// use shared_types::{impl_correlated, Correlated, CorrelationId};
///
/// #[derive(Default)]
/// struct Ping {
///     correlation_id: Option<CorrelationId>,
///     body: String,
/// }
///
/// impl_correlated!(Ping, correlation_id);
///
/// let mut ping = Ping::default();
/// let id = CorrelationId::new();
/// ping.set_correlation_id(id);
/// assert_eq!(ping.correlation_id(), Some(id));
/// ```
#[macro_export]
macro_rules! impl_correlated {
    ($ty:ty, $field:ident) => {
        impl $crate::Correlated for $ty {
            fn correlation_id(&self) -> Option<$crate::CorrelationId> {
                self.$field
            }

            fn set_correlation_id(&mut self, id: $crate::CorrelationId) {
                self.$field = Some(id);
            }
        }
    };
}
