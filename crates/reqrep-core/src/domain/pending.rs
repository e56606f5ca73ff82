//! Pending Request Table - maps correlation IDs to waiting callers.
//!
//! Backed by a sharded `DashMap`, so unrelated requests contend only when
//! their IDs hash to the same shard.
//!
//! Every path that takes an entry out of the table does so with `remove`,
//! which is atomic under the shard lock. Only the actor that removed an entry
//! may settle its handle through the table, and the handle's compare-and-swap
//! rejects any second settle attempt. An ID therefore maps to at most one
//! handle, each handle settles once, and no entry outlives its settlement,
//! under any interleaving of `resolve`, `remove` and `cancel_all`.

use crate::domain::completion::CompletionHandle;
use crate::domain::errors::RequestError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::CorrelationId;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A registered request awaiting its reply.
pub struct PendingEntry<T> {
    /// Settling side of the caller's completion.
    handle: Arc<CompletionHandle<T>>,
    /// When the request was registered
    created_at: Instant,
}

impl<T> PendingEntry<T> {
    fn new(handle: Arc<CompletionHandle<T>>) -> Self {
        Self {
            handle,
            created_at: Instant::now(),
        }
    }

    /// The entry's completion handle.
    #[must_use]
    pub fn handle(&self) -> &Arc<CompletionHandle<T>> {
        &self.handle
    }

    /// Registration time.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since registration.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Result of routing a reply through the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// A waiting caller received the reply.
    Resolved,
    /// No entry for the ID: foreign, duplicate or late reply.
    Unmatched,
    /// The entry existed but its handle had already settled.
    AlreadySettled,
}

/// Concurrency-safe map from correlation ID to pending entry.
///
/// The table performs no background cleanup. Entries leave it only through
/// reply resolution, explicit removal by the requester, or `cancel_all`.
pub struct PendingRequestTable<T> {
    entries: DashMap<CorrelationId, PendingEntry<T>>,
}

impl<T> PendingRequestTable<T> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register a handle under `id`.
    ///
    /// # Errors
    ///
    /// `RequestError::RegistrationConflict` if `id` is already present; the
    /// existing entry is left untouched.
    pub fn insert_if_absent(
        &self,
        id: CorrelationId,
        handle: Arc<CompletionHandle<T>>,
    ) -> Result<(), RequestError> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(RequestError::RegistrationConflict(id)),
            Entry::Vacant(slot) => {
                slot.insert(PendingEntry::new(handle));
                Ok(())
            }
        }
    }

    /// Remove and return the entry for `id`. Idempotent.
    pub fn remove(&self, id: &CorrelationId) -> Option<PendingEntry<T>> {
        self.entries.remove(id).map(|(_, entry)| entry)
    }

    /// Look up `id` and resolve its handle with `value`.
    ///
    /// The entry is removed before the handle is settled, so a concurrent
    /// cancellation either finds the entry gone or wins it first.
    pub fn resolve(&self, id: &CorrelationId, value: T) -> ResolveOutcome {
        match self.remove(id) {
            None => ResolveOutcome::Unmatched,
            Some(entry) if entry.handle.resolve(value) => ResolveOutcome::Resolved,
            Some(_) => ResolveOutcome::AlreadySettled,
        }
    }

    /// Remove every entry and cancel its handle.
    ///
    /// Returns the number of handles this call cancelled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<CorrelationId> = self.entries.iter().map(|entry| *entry.key()).collect();

        ids.iter()
            .filter_map(|id| self.remove(id))
            .filter(|entry| entry.handle.cancel())
            .count()
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Age of the longest-waiting entry.
    #[must_use]
    pub fn oldest_age(&self) -> Option<Duration> {
        self.entries.iter().map(|entry| entry.age()).max()
    }
}

impl<T> Default for PendingRequestTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
