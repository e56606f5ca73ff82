//! Domain layer: the correlation primitives, free of transport and runtime
//! concerns.

pub mod completion;
pub mod errors;
pub mod pending;
pub mod stats;

pub use completion::{Completion, CompletionHandle, CompletionState};
pub use errors::{HandlerFailure, RequestError};
pub use pending::{PendingEntry, PendingRequestTable, ResolveOutcome};
pub use stats::{ReplierStats, ReplierStatsSnapshot, RequestStats, RequestStatsSnapshot};
