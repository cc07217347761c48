//! In-memory library API for tests.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::client::{ApiError, LibraryApi};
use crate::models::{
    BulkIngestResponse, DownloadStats, IngestResponse, LibraryListResponse, LibraryQuery, Paper,
    PaperSource, RetryDownloadsResponse, RetryScope, SearchRequest, SearchResponse,
};

/// A recorded bulk ingest call
#[derive(Debug, Clone, PartialEq)]
pub struct BulkCall {
    pub papers: Vec<Paper>,
    pub search_query: String,
}

#[derive(Debug, Default)]
struct MockState {
    search_responses: VecDeque<(Option<Duration>, Result<SearchResponse, ApiError>)>,
    search_calls: Vec<SearchRequest>,
    saved: BTreeSet<String>,
    next_entry_id: i64,
    failing_bulk_calls: HashSet<usize>,
    bulk_delay: Option<Duration>,
    bulk_calls: Vec<BulkCall>,
    ingest_one_error: Option<ApiError>,
    ingest_one_calls: Vec<(Paper, String)>,
    check_error: Option<ApiError>,
    check_calls: Vec<Vec<String>>,
    library: LibraryListResponse,
    library_calls: Vec<LibraryQuery>,
    download_stats: DownloadStats,
    retry_calls: Vec<RetryScope>,
}

/// A scriptable [`LibraryApi`] that keeps a set of saved external ids.
///
/// Bulk and single ingests add unseen external ids to that set and report
/// already-present ones as duplicates, which is how the real service behaves.
#[derive(Debug, Default)]
pub struct MockLibraryApi {
    state: Mutex<MockState>,
}

impl MockLibraryApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a search response; responses are consumed in call order
    pub fn push_search_response(&self, response: SearchResponse) {
        self.state().search_responses.push_back((None, Ok(response)));
    }

    /// Queue a search response that is returned only after `delay`
    pub fn push_delayed_search_response(&self, response: SearchResponse, delay: Duration) {
        self.state()
            .search_responses
            .push_back((Some(delay), Ok(response)));
    }

    pub fn push_search_error(&self, error: ApiError) {
        self.state().search_responses.push_back((None, Err(error)));
    }

    /// Mark external ids as already present in the library
    pub fn set_saved<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().saved = ids.into_iter().map(Into::into).collect();
    }

    /// Make the n-th bulk ingest call (1-based) fail with a network error
    pub fn fail_bulk_call(&self, call_number: usize) {
        self.state().failing_bulk_calls.insert(call_number);
    }

    /// Hold every bulk ingest call for `delay` before answering
    pub fn delay_bulk_calls(&self, delay: Duration) {
        self.state().bulk_delay = Some(delay);
    }

    pub fn fail_ingest_one(&self, error: ApiError) {
        self.state().ingest_one_error = Some(error);
    }

    pub fn fail_check(&self, error: ApiError) {
        self.state().check_error = Some(error);
    }

    pub fn set_library(&self, response: LibraryListResponse) {
        self.state().library = response;
    }

    pub fn set_download_stats(&self, stats: DownloadStats) {
        self.state().download_stats = stats;
    }

    pub fn search_calls(&self) -> Vec<SearchRequest> {
        self.state().search_calls.clone()
    }

    pub fn bulk_calls(&self) -> Vec<BulkCall> {
        self.state().bulk_calls.clone()
    }

    pub fn ingest_one_calls(&self) -> Vec<(Paper, String)> {
        self.state().ingest_one_calls.clone()
    }

    pub fn check_calls(&self) -> Vec<Vec<String>> {
        self.state().check_calls.clone()
    }

    pub fn library_calls(&self) -> Vec<LibraryQuery> {
        self.state().library_calls.clone()
    }

    pub fn retry_calls(&self) -> Vec<RetryScope> {
        self.state().retry_calls.clone()
    }

    pub fn saved(&self) -> BTreeSet<String> {
        self.state().saved.clone()
    }
}

#[async_trait]
impl LibraryApi for MockLibraryApi {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ApiError> {
        let next = {
            let mut state = self.state();
            state.search_calls.push(request.clone());
            state.search_responses.pop_front()
        };

        match next {
            Some((delay, result)) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Ok(SearchResponse::default()),
        }
    }

    async fn ingest_one(
        &self,
        paper: &Paper,
        search_query: &str,
    ) -> Result<IngestResponse, ApiError> {
        let mut state = self.state();
        state
            .ingest_one_calls
            .push((paper.clone(), search_query.to_string()));

        if let Some(err) = state.ingest_one_error.clone() {
            return Err(err);
        }

        let status = match &paper.external_id {
            Some(id) if !state.saved.insert(id.clone()) => "duplicate",
            _ => "added",
        };
        state.next_entry_id += 1;

        Ok(IngestResponse {
            status: status.to_string(),
            entry_id: state.next_entry_id,
        })
    }

    async fn ingest_batch(
        &self,
        papers: &[Paper],
        search_query: &str,
    ) -> Result<BulkIngestResponse, ApiError> {
        let delay = self.state().bulk_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.bulk_calls.push(BulkCall {
            papers: papers.to_vec(),
            search_query: search_query.to_string(),
        });

        let call_number = state.bulk_calls.len();
        if state.failing_bulk_calls.contains(&call_number) {
            return Err(ApiError::Network(format!(
                "bulk call {} dropped",
                call_number
            )));
        }

        let mut response = BulkIngestResponse {
            status: "ok".to_string(),
            ..Default::default()
        };
        for paper in papers {
            let is_new = match &paper.external_id {
                Some(id) => state.saved.insert(id.clone()),
                None => true,
            };
            if is_new {
                state.next_entry_id += 1;
                response.added_count += 1;
                response.entry_ids.push(state.next_entry_id);
            } else {
                response.duplicate_count += 1;
            }
        }

        Ok(response)
    }

    async fn check_saved(&self, external_ids: &[String]) -> Result<Vec<String>, ApiError> {
        let mut state = self.state();
        state.check_calls.push(external_ids.to_vec());

        if let Some(err) = state.check_error.clone() {
            return Err(err);
        }

        Ok(external_ids
            .iter()
            .filter(|id| state.saved.contains(*id))
            .cloned()
            .collect())
    }

    async fn list_library(&self, query: &LibraryQuery) -> Result<LibraryListResponse, ApiError> {
        let mut state = self.state();
        state.library_calls.push(query.clone());
        Ok(state.library.clone())
    }

    async fn download_stats(&self) -> Result<DownloadStats, ApiError> {
        Ok(self.state().download_stats.clone())
    }

    async fn retry_downloads(
        &self,
        scope: RetryScope,
    ) -> Result<RetryDownloadsResponse, ApiError> {
        self.state().retry_calls.push(scope);
        Ok(RetryDownloadsResponse {
            status: "ok".to_string(),
            message: format!("re-queued ({})", scope.as_str()),
        })
    }
}

/// Helper function to create a paper for testing.
pub fn make_paper(title: &str, external_id: Option<&str>) -> Paper {
    Paper {
        external_id: external_id.map(str::to_string),
        ..Paper::new(title, PaperSource::Semantic)
    }
}

/// `count` papers with DOI-like external ids `10.1000/<prefix>.<n>`
pub fn make_papers(prefix: &str, count: usize) -> Vec<Paper> {
    (0..count)
        .map(|n| {
            let doi = format!("10.1000/{}.{}", prefix, n);
            make_paper(&format!("{} paper {}", prefix, n), Some(&doi))
        })
        .collect()
}
