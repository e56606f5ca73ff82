//! Counters for requester and replier activity.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Statistics for a requester.
#[derive(Debug, Default)]
pub struct RequestStats {
    /// Requests registered in the pending table
    pub registered: AtomicU64,
    /// Requests that received their reply
    pub completed: AtomicU64,
    /// Requests cancelled, timed out, abandoned or cut off by shutdown
    pub cancelled: AtomicU64,
    /// Requests the transport refused
    pub publish_failures: AtomicU64,
    /// Replies dropped because no pending entry matched
    pub unmatched_replies: AtomicU64,
}

impl RequestStats {
    /// Copy the counters into a plain value.
    #[must_use]
    pub fn snapshot(&self) -> RequestStatsSnapshot {
        RequestStatsSnapshot {
            registered: self.registered.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            unmatched_replies: self.unmatched_replies.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RequestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestStatsSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub publish_failures: u64,
    pub unmatched_replies: u64,
}

impl RequestStatsSnapshot {
    /// Requests that have reached an outcome.
    #[must_use]
    pub fn settled(&self) -> u64 {
        self.completed + self.cancelled + self.publish_failures
    }
}

/// Statistics for a replier.
#[derive(Debug, Default)]
pub struct ReplierStats {
    /// Requests taken off the transport
    pub received: AtomicU64,
    /// Replies published
    pub replied: AtomicU64,
    /// Requests reported to the failure sink
    pub failed: AtomicU64,
}

impl ReplierStats {
    /// Copy the counters into a plain value.
    #[must_use]
    pub fn snapshot(&self) -> ReplierStatsSnapshot {
        ReplierStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            replied: self.replied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ReplierStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplierStatsSnapshot {
    pub received: u64,
    pub replied: u64,
    pub failed: u64,
}
