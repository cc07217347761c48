//! The synchronisation engine.
//!
//! [`SyncEngine`] ties the [`Store`] to a [`LibraryApi`]: it runs searches,
//! keeps saved status in step with the library, drives bulk ingestion and
//! refreshes the library view. All state changes go through
//! [`Store::update`].

mod error;
mod guard;
mod ingest;
mod reconcile;
mod refresh;

pub use error::{SyncError, ValidationError};
pub use ingest::{
    chunk_count, confirmation_message, ChunkOutcome, IngestEvent, IngestSummary,
    DEFAULT_CHUNK_SIZE,
};
pub use reconcile::{checkable_ids, is_checkable};
pub use refresh::spawn_refresher;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client::LibraryApi;
use crate::config::Config;
use crate::models::{DownloadStats, Paper, RetryDownloadsResponse, SearchRequest};
use crate::store::{BatchState, ItemId, Store};
use guard::{BatchCompletion, SearchInFlight};

/// Result of a [`SyncEngine::search`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Results were installed in the store
    Applied {
        results: usize,
        /// Results the library already holds
        already_saved: usize,
    },
    /// A newer search started before this one returned; its response was dropped
    Superseded,
}

/// Pending "add all" confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    pub candidates: usize,
    pub chunks: usize,
    pub message: String,
}

/// Client-side sync engine
#[derive(Debug, Clone)]
pub struct SyncEngine {
    api: Arc<dyn LibraryApi>,
    store: Store,
    chunk_size: usize,
    library_limit: u32,
}

impl SyncEngine {
    pub fn new(api: Arc<dyn LibraryApi>, config: &Config) -> Self {
        Self::with_store(api, Store::with_page_size(config.items_per_page()), config)
    }

    pub fn with_store(api: Arc<dyn LibraryApi>, store: Store, config: &Config) -> Self {
        Self {
            api,
            store,
            chunk_size: config.chunk_size(),
            library_limit: config.refresh.library_limit,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn api(&self) -> &Arc<dyn LibraryApi> {
        &self.api
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run a search and install its results.
    ///
    /// Overlapping searches resolve last-writer-wins: only the most recently
    /// started search may touch the result list. On failure the list is
    /// emptied and the error returned. Dropping the returned future before
    /// the response arrives clears the loading flag and keeps the old
    /// results.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchOutcome, SyncError> {
        let request = validate_search(request)?;
        let generation = self.store.update(|s| s.begin_search(&request.query));
        let in_flight = SearchInFlight::new(&self.store, generation);
        tracing::info!("Searching for '{}'", request.query);

        let result = self.api.search(&request).await;
        in_flight.settle();

        match result {
            Ok(response) => {
                let count = response.results.len();
                let applied = self.store.update(|s| {
                    s.finish_search(generation, response.results, Some(response.meta))
                });
                if !applied {
                    tracing::debug!("Dropping superseded results for '{}'", request.query);
                    return Ok(SearchOutcome::Superseded);
                }

                tracing::info!("Found {} papers for '{}'", count, request.query);
                self.reconcile_saved().await;
                let already_saved = self.store.read(|s| s.saved_in_results());
                Ok(SearchOutcome::Applied {
                    results: count,
                    already_saved,
                })
            }
            Err(e) => {
                let current = self
                    .store
                    .update(|s| s.finish_search(generation, Vec::new(), None));
                if !current {
                    tracing::debug!("Ignoring error from superseded search: {}", e);
                    return Ok(SearchOutcome::Superseded);
                }
                tracing::warn!("Search for '{}' failed: {}", request.query, e);
                Err(e.into())
            }
        }
    }

    /// Mark current results the library already holds.
    ///
    /// Failures are logged and leave saved status unchanged. Returns the
    /// number of newly marked ids.
    pub async fn reconcile_saved(&self) -> usize {
        let candidates = self.store.read(|s| checkable_ids(s.search_results()));

        match reconcile::reconcile(self.api.as_ref(), &candidates).await {
            Ok(saved) => self.store.update(|s| s.mark_saved(saved)),
            Err(e) => {
                tracing::warn!("Saved-status check failed: {}", e);
                0
            }
        }
    }

    /// Add one search result to the library
    pub async fn ingest_one(&self, item: &ItemId) -> Result<(), SyncError> {
        let id = match item {
            ItemId::Search(id) => id,
            ItemId::Library(_) => {
                return Err(ValidationError::UnknownItem(item.to_string()).into())
            }
        };
        let (paper, query) = self
            .store
            .read(|s| {
                s.result(id)
                    .map(|r| (r.paper().clone(), s.last_search_query().to_string()))
            })
            .ok_or_else(|| ValidationError::UnknownItem(id.clone()))?;

        let response = self.api.ingest_one(&paper, &query).await?;
        tracing::info!(
            "Ingested '{}' ({}, entry {})",
            paper.title,
            response.status,
            response.entry_id
        );

        self.store.update(|s| {
            if let Some(external) = paper.external_id.filter(|e| !e.is_empty()) {
                s.mark_saved([external]);
            }
            s.invalidate_library();
        });
        Ok(())
    }

    /// Ingest the checked results right away
    pub async fn ingest_selected(
        &self,
        cancel: CancellationToken,
        progress: impl Fn(IngestEvent),
    ) -> Result<IngestSummary, SyncError> {
        let papers = self.store.read(|s| {
            if s.selection().is_empty() {
                Err(ValidationError::NothingSelected)
            } else {
                Ok(s.selected_papers())
            }
        })?;
        if papers.is_empty() {
            return Err(ValidationError::NothingSelected.into());
        }

        self.store.update(|s| {
            if s.batch().is_idle() {
                s.set_batch(BatchState::Running {
                    chunk: 0,
                    total_chunks: chunk_count(papers.len(), self.chunk_size),
                });
                Ok(())
            } else {
                Err(SyncError::BatchInProgress)
            }
        })?;

        Ok(self.run_ingest(papers, &cancel, progress).await)
    }

    /// Start the "add all" flow; nothing is sent until [`confirm_ingest_all`](Self::confirm_ingest_all)
    pub fn request_ingest_all(&self) -> Result<ConfirmationPrompt, SyncError> {
        let chunk_size = self.chunk_size;
        self.store.update(|s| {
            if !s.batch().is_idle() {
                return Err(SyncError::BatchInProgress);
            }
            let candidates = s.visible().total_count;
            if candidates == 0 {
                return Err(ValidationError::NoCandidates.into());
            }
            let chunks = chunk_count(candidates, chunk_size);
            s.set_batch(BatchState::Confirming { candidates, chunks });
            Ok(ConfirmationPrompt {
                candidates,
                chunks,
                message: confirmation_message(candidates, chunk_size),
            })
        })
    }

    /// Dismiss a pending confirmation. Returns false if none was pending.
    pub fn cancel_ingest_all(&self) -> bool {
        self.store.update(|s| {
            if matches!(s.batch(), BatchState::Confirming { .. }) {
                s.set_batch(BatchState::Idle);
                true
            } else {
                false
            }
        })
    }

    /// Ingest every result passing the current filters.
    ///
    /// The candidate list is read when this is called, not when the
    /// confirmation was requested.
    pub async fn confirm_ingest_all(
        &self,
        cancel: CancellationToken,
        progress: impl Fn(IngestEvent),
    ) -> Result<IngestSummary, SyncError> {
        let chunk_size = self.chunk_size;
        let papers = self.store.update(|s| {
            if !matches!(s.batch(), BatchState::Confirming { .. }) {
                return Err(SyncError::NotConfirming);
            }
            let papers = s.visible_papers();
            if papers.is_empty() {
                s.set_batch(BatchState::Idle);
                return Err(ValidationError::NoCandidates.into());
            }
            s.set_batch(BatchState::Running {
                chunk: 0,
                total_chunks: chunk_count(papers.len(), chunk_size),
            });
            Ok(papers)
        })?;

        Ok(self.run_ingest(papers, &cancel, progress).await)
    }

    /// Send `papers` and finish the batch.
    ///
    /// Completion (selection cleared, saved ids merged, library marked
    /// stale, back to `Idle`) also runs if this future is dropped mid-run,
    /// using whatever chunks finished before the drop.
    async fn run_ingest(
        &self,
        papers: Vec<Paper>,
        cancel: &CancellationToken,
        progress: impl Fn(IngestEvent),
    ) -> IngestSummary {
        let mut completion = BatchCompletion::new(&self.store);
        let query = self.store.read(|s| s.last_search_query().to_string());
        tracing::info!(
            "Ingesting {} papers in {} chunks",
            papers.len(),
            chunk_count(papers.len(), self.chunk_size)
        );

        ingest::run_chunks(
            self.api.as_ref(),
            &papers,
            &query,
            self.chunk_size,
            cancel,
            &mut completion.summary,
            |event| {
                if let IngestEvent::ChunkStarted {
                    chunk,
                    total_chunks,
                    ..
                } = event
                {
                    self.store.update(|s| {
                        s.set_batch(BatchState::Running {
                            chunk,
                            total_chunks,
                        })
                    });
                }
                progress(event);
            },
        )
        .await;

        let summary = completion.finish();
        tracing::info!("Ingestion finished: {}", summary.message());
        summary
    }

    /// Fetch the library listing for the current library filters
    pub async fn refresh_library(&self) -> Result<u32, SyncError> {
        let query = self
            .store
            .read(|s| s.library_filters().to_query(self.library_limit));
        let listing = self.api.list_library(&query).await?;
        let total = listing.total;
        self.store.update(|s| s.set_library_listing(listing));
        Ok(total)
    }

    pub async fn refresh_download_stats(&self) -> Result<DownloadStats, SyncError> {
        let stats = self.api.download_stats().await?;
        self.store.update(|s| s.set_download_stats(stats.clone()));
        Ok(stats)
    }

    /// Re-queue downloads, retrying failures if there are any, else stuck entries
    pub async fn retry_downloads(&self) -> Result<RetryDownloadsResponse, SyncError> {
        let stats = match self.store.read(|s| s.download_stats().cloned()) {
            Some(stats) => stats,
            None => self.refresh_download_stats().await?,
        };
        let scope = stats.suggested_retry_scope();

        let response = self.api.retry_downloads(scope).await?;
        tracing::info!("Retry ({}): {}", scope.as_str(), response.message);

        self.store.update(|s| s.invalidate_library());
        if let Err(e) = self.refresh_download_stats().await {
            tracing::warn!("Could not refresh download stats: {}", e);
        }
        Ok(response)
    }
}

fn validate_search(mut request: SearchRequest) -> Result<SearchRequest, ValidationError> {
    request.query = request.query.trim().to_string();
    if request.query.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    if let (Some(start), Some(end)) = (request.year_start, request.year_end) {
        if start > end {
            return Err(ValidationError::InvalidYearRange { start, end });
        }
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{make_paper, make_papers};
    use crate::client::{ApiError, MockLibraryApi};
    use crate::models::{DownloadStats, RetryScope, SearchResponse};
    use std::time::Duration;

    fn engine(api: &Arc<MockLibraryApi>) -> SyncEngine {
        SyncEngine::new(api.clone(), &Config::default())
    }

    #[test]
    fn test_validate_search() {
        assert_eq!(
            validate_search(SearchRequest::new("   ")),
            Err(ValidationError::EmptyQuery)
        );
        assert_eq!(
            validate_search(SearchRequest::new("x").year_start(2020).year_end(2010)),
            Err(ValidationError::InvalidYearRange {
                start: 2020,
                end: 2010
            })
        );
        assert_eq!(
            validate_search(SearchRequest::new("  graphs ")).unwrap().query,
            "graphs"
        );
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_request() {
        let api = Arc::new(MockLibraryApi::new());
        let engine = engine(&api);

        let err = engine.search(SearchRequest::new(" ")).await.unwrap_err();

        assert_eq!(err, SyncError::Validation(ValidationError::EmptyQuery));
        assert!(api.search_calls().is_empty());
        assert!(!engine.store().read(|s| s.is_searching()));
    }

    #[tokio::test]
    async fn test_search_reconciles_doi_ids_only() {
        let api = Arc::new(MockLibraryApi::new());
        api.set_saved(["10.1/x"]);
        api.push_search_response(SearchResponse::new(vec![
            make_paper("a", Some("10.1/x")),
            make_paper("b", Some("paper-2")),
            make_paper("c", None),
        ]));
        let engine = engine(&api);

        let outcome = engine.search(SearchRequest::new("q")).await.unwrap();

        assert_eq!(
            outcome,
            SearchOutcome::Applied {
                results: 3,
                already_saved: 1
            }
        );
        assert_eq!(api.check_calls(), vec![vec!["10.1/x".to_string()]]);
    }

    #[tokio::test]
    async fn test_search_failure_clears_results() {
        let api = Arc::new(MockLibraryApi::new());
        api.push_search_response(SearchResponse::new(make_papers("a", 4)));
        api.push_search_error(ApiError::Network("down".to_string()));
        let engine = engine(&api);

        engine.search(SearchRequest::new("first")).await.unwrap();
        let err = engine.search(SearchRequest::new("second")).await.unwrap_err();

        assert!(matches!(err, SyncError::Api(ApiError::Network(_))));
        engine.store().read(|s| {
            assert!(s.search_results().is_empty());
            assert!(!s.is_searching());
        });
    }

    #[tokio::test]
    async fn test_check_failure_is_swallowed() {
        let api = Arc::new(MockLibraryApi::new());
        api.fail_check(ApiError::Network("nope".to_string()));
        api.push_search_response(SearchResponse::new(make_papers("a", 2)));
        let engine = engine(&api);

        let outcome = engine.search(SearchRequest::new("q")).await.unwrap();

        assert_eq!(
            outcome,
            SearchOutcome::Applied {
                results: 2,
                already_saved: 0
            }
        );
    }

    #[tokio::test]
    async fn test_overlapping_searches_last_writer_wins() {
        let api = Arc::new(MockLibraryApi::new());
        api.push_delayed_search_response(
            SearchResponse::new(make_papers("slow", 5)),
            Duration::from_millis(50),
        );
        api.push_search_response(SearchResponse::new(make_papers("fast", 2)));
        let engine = engine(&api);

        let slow = engine.search(SearchRequest::new("slow"));
        let fast = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            engine.search(SearchRequest::new("fast")).await
        };
        let (slow, fast) = tokio::join!(slow, fast);

        assert_eq!(slow.unwrap(), SearchOutcome::Superseded);
        assert!(matches!(fast.unwrap(), SearchOutcome::Applied { results: 2, .. }));
        engine.store().read(|s| {
            assert_eq!(s.search_results().len(), 2);
            assert_eq!(s.last_search_query(), "fast");
            assert!(!s.is_searching());
        });
    }

    #[tokio::test]
    async fn test_ingest_one_marks_saved() {
        let api = Arc::new(MockLibraryApi::new());
        api.push_search_response(SearchResponse::new(make_papers("a", 2)));
        let engine = engine(&api);
        engine.search(SearchRequest::new("topic")).await.unwrap();
        let revision = engine.store().read(|s| s.library_revision());

        engine
            .ingest_one(&ItemId::Search("10.1000/a.1".to_string()))
            .await
            .unwrap();

        assert_eq!(api.ingest_one_calls()[0].1, "topic");
        engine.store().read(|s| {
            assert!(s.saved_external_ids().contains("10.1000/a.1"));
            assert!(s.library_revision() > revision);
        });
    }

    #[tokio::test]
    async fn test_ingest_one_failure_leaves_saved_status() {
        let api = Arc::new(MockLibraryApi::new());
        api.fail_ingest_one(ApiError::Network("gone".to_string()));
        api.push_search_response(SearchResponse::new(make_papers("a", 1)));
        let engine = engine(&api);
        engine.search(SearchRequest::new("q")).await.unwrap();

        let result = engine
            .ingest_one(&ItemId::Search("10.1000/a.0".to_string()))
            .await;

        assert!(result.is_err());
        assert!(engine.store().read(|s| s.saved_external_ids().is_empty()));
    }

    #[tokio::test]
    async fn test_ingest_one_unknown_item() {
        let api = Arc::new(MockLibraryApi::new());
        let engine = engine(&api);
        let err = engine
            .ingest_one(&ItemId::Search("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::Validation(ValidationError::UnknownItem("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_ingest_selected_requires_selection() {
        let api = Arc::new(MockLibraryApi::new());
        let engine = engine(&api);
        let err = engine
            .ingest_selected(CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::Validation(ValidationError::NothingSelected));
        assert!(api.bulk_calls().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_without_request_is_rejected() {
        let api = Arc::new(MockLibraryApi::new());
        let engine = engine(&api);
        let err = engine
            .confirm_ingest_all(CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::NotConfirming);
    }

    #[tokio::test]
    async fn test_request_ingest_all_with_no_candidates() {
        let api = Arc::new(MockLibraryApi::new());
        let engine = engine(&api);
        assert_eq!(
            engine.request_ingest_all(),
            Err(SyncError::Validation(ValidationError::NoCandidates))
        );
        assert!(engine.store().read(|s| s.batch().is_idle()));
    }

    #[tokio::test]
    async fn test_cancel_confirmation_returns_to_idle() {
        let api = Arc::new(MockLibraryApi::new());
        api.push_search_response(SearchResponse::new(make_papers("a", 3)));
        let engine = engine(&api);
        engine.search(SearchRequest::new("q")).await.unwrap();

        let prompt = engine.request_ingest_all().unwrap();
        assert_eq!(prompt.candidates, 3);
        assert_eq!(
            engine.request_ingest_all(),
            Err(SyncError::BatchInProgress)
        );
        assert!(engine.cancel_ingest_all());
        assert!(!engine.cancel_ingest_all());
        assert!(api.bulk_calls().is_empty());
    }

    #[tokio::test]
    async fn test_retry_scope_follows_stats() {
        let api = Arc::new(MockLibraryApi::new());
        api.set_download_stats(DownloadStats {
            failed: 2,
            ..Default::default()
        });
        let engine = engine(&api);

        engine.retry_downloads().await.unwrap();
        assert_eq!(api.retry_calls(), vec![RetryScope::All]);

        api.set_download_stats(DownloadStats::default());
        engine.refresh_download_stats().await.unwrap();
        engine.retry_downloads().await.unwrap();
        assert_eq!(api.retry_calls(), vec![RetryScope::All, RetryScope::Stuck]);
    }

    #[tokio::test]
    async fn test_refresh_library_uses_filters() {
        let api = Arc::new(MockLibraryApi::new());
        let engine = engine(&api);
        engine
            .store()
            .update(|s| s.set_library_search("transformers"));

        engine.refresh_library().await.unwrap();

        let calls = api.library_calls();
        assert_eq!(calls[0].search.as_deref(), Some("transformers"));
        assert_eq!(calls[0].limit, Some(100));
    }
}
