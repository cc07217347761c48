//! Store cleanup that survives a dropped future.
//!
//! Dropping a future is how async callers cancel work (`select!`,
//! `timeout`, an aborted task). These guards hold the state a run needs to
//! leave behind and write it to the store from `Drop`, so the store never
//! stays loading or mid-batch after its driver goes away.

use crate::store::{BatchState, Store};
use crate::sync::IngestSummary;

/// Completes a batch run: clears the selection, merges saved ids, marks the
/// library stale, returns to `Idle` and records the summary.
pub(crate) struct BatchCompletion<'a> {
    store: &'a Store,
    pub(crate) summary: IngestSummary,
    finished: bool,
}

impl<'a> BatchCompletion<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            summary: IngestSummary::default(),
            finished: false,
        }
    }

    /// Record a run that reached its end and hand back its summary
    pub(crate) fn finish(mut self) -> IngestSummary {
        self.finished = true;
        self.summary.clone()
    }
}

impl Drop for BatchCompletion<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                "Ingestion dropped after {}/{} chunks",
                self.summary.chunks_sent,
                self.summary.total_chunks
            );
            self.summary.cancelled = true;
        }

        let summary = &self.summary;
        self.store.update(|s| {
            s.clear_selection();
            s.mark_saved(summary.saved_ids.iter().cloned());
            s.invalidate_library();
            s.set_batch(BatchState::Idle);
            s.set_last_summary(summary.clone());
        });
    }
}

/// Clears the loading flag of a search whose response never arrived
pub(crate) struct SearchInFlight<'a> {
    store: &'a Store,
    generation: u64,
    settled: bool,
}

impl<'a> SearchInFlight<'a> {
    pub(crate) fn new(store: &'a Store, generation: u64) -> Self {
        Self {
            store,
            generation,
            settled: false,
        }
    }

    /// The response (or error) was handed to the store
    pub(crate) fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for SearchInFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let generation = self.generation;
        if self.store.update(|s| s.abandon_search(generation)) {
            tracing::debug!("Search {} dropped before completing", generation);
        }
    }
}
