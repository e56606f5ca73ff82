//! Application services: the requester and replier built on the domain
//! primitives and the transport ports.

pub mod replier;
pub mod requester;

pub use replier::{Replier, ReplierSubscription};
pub use requester::Requester;
