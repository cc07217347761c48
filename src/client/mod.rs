//! Library API client seam.
//!
//! The engine never talks HTTP directly: everything goes through the
//! [`LibraryApi`] trait so the transport can be swapped for the in-memory
//! [`MockLibraryApi`] in tests. [`HttpLibraryClient`] is the `reqwest`
//! implementation used by the binary.
//!
//! Every call is independently failable; no call is retried here.

mod http;
pub mod mock;

pub use http::HttpLibraryClient;
pub use mock::MockLibraryApi;

use async_trait::async_trait;

use crate::models::{
    BulkIngestResponse, DownloadStats, IngestResponse, LibraryListResponse, LibraryQuery, Paper,
    RetryDownloadsResponse, RetryScope, SearchRequest, SearchResponse,
};

/// Remote library and search service.
#[async_trait]
pub trait LibraryApi: Send + Sync + std::fmt::Debug {
    /// Run an aggregated search across all providers
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ApiError>;

    /// Copy a single search result into the library
    async fn ingest_one(&self, paper: &Paper, search_query: &str)
        -> Result<IngestResponse, ApiError>;

    /// Copy up to one chunk of search results into the library
    async fn ingest_batch(
        &self,
        papers: &[Paper],
        search_query: &str,
    ) -> Result<BulkIngestResponse, ApiError>;

    /// Return the subset of `external_ids` already present in the library
    async fn check_saved(&self, external_ids: &[String]) -> Result<Vec<String>, ApiError>;

    /// List library entries
    async fn list_library(&self, query: &LibraryQuery) -> Result<LibraryListResponse, ApiError>;

    /// Download pipeline counters
    async fn download_stats(&self) -> Result<DownloadStats, ApiError>;

    /// Re-queue unfinished downloads
    async fn retry_downloads(&self, scope: RetryScope)
        -> Result<RetryDownloadsResponse, ApiError>;
}

/// Coarse failure class of an API call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No response was received
    Transport,
    /// The service answered with an error or an unreadable body
    Api,
}

/// Errors returned by a [`LibraryApi`] implementation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Connection, timeout or other transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Structured error returned by the service
    #[error("API error ({status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        suggestion: Option<String>,
    },

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// The request could not be built (bad base URL, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ApiError::Network(_) => ErrorClass::Transport,
            _ => ErrorClass::Api,
        }
    }

    /// User-facing hint attached by the service, if any
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            ApiError::Api { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse(format!("JSON: {}", err))
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidRequest(format!("URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_class() {
        assert_eq!(
            ApiError::Network("connection refused".into()).class(),
            ErrorClass::Transport
        );

        let err = ApiError::Api {
            status: 422,
            code: "VALIDATION_ERROR".into(),
            message: "query too short".into(),
            suggestion: Some("use at least 3 characters".into()),
        };
        assert_eq!(err.class(), ErrorClass::Api);
        assert_eq!(err.suggestion(), Some("use at least 3 characters"));
        assert_eq!(
            err.to_string(),
            "API error (422) VALIDATION_ERROR: query too short"
        );
    }
}
