//! Library entries, library listing queries and download pipeline status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Author, PaperSource};

/// Lowest year bound forwarded to the library endpoint; smaller values are
/// treated as half-typed input and dropped.
pub const MIN_FILTER_YEAR: i32 = 1900;

/// Download pipeline state of a library entry.
///
/// Driven by the remote download workers and only ever observed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(DownloadStatus::Pending),
            "downloading" => Some(DownloadStatus::Downloading),
            "completed" => Some(DownloadStatus::Completed),
            "failed" => Some(DownloadStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Full paper record as persisted by the library service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperDetail {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub r#abstract: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub citation_count: u32,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    pub created_at: DateTime<Utc>,
}

/// A paper saved in the personal library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Server-assigned, stable identifier
    pub id: i64,
    /// Provider the paper was originally ingested from
    pub source: PaperSource,
    pub download_status: DownloadStatus,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
    pub paper: PaperDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryListResponse {
    pub items: Vec<LibraryEntry>,
    pub total: u32,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

/// Query parameters for the library listing endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub tag: Option<String>,
    pub status: Option<DownloadStatus>,
    pub min_citations: Option<u32>,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
    pub search: Option<String>,
}

impl LibraryQuery {
    /// Render only the parameters that are set.
    ///
    /// Empty strings are dropped and year bounds below [`MIN_FILTER_YEAR`]
    /// are ignored.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(page) = self.page.filter(|p| *p > 0) {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(tag) = non_empty(&self.tag) {
            pairs.push(("tag", tag.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(min) = self.min_citations {
            pairs.push(("min_citations", min.to_string()));
        }
        if let Some(year) = self.year_start.filter(|y| *y >= MIN_FILTER_YEAR) {
            pairs.push(("year_start", year.to_string()));
        }
        if let Some(year) = self.year_end.filter(|y| *y >= MIN_FILTER_YEAR) {
            pairs.push(("year_end", year.to_string()));
        }
        if let Some(search) = non_empty(&self.search) {
            pairs.push(("search", search.to_string()));
        }

        pairs
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub id: i64,
    pub paper_id: i64,
    pub title: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Aggregate counters of the remote download pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadStats {
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub downloading: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub failed_entries: Vec<FailedEntry>,
}

impl DownloadStats {
    /// Whether a retry request would have anything to re-queue
    pub fn has_retryable(&self) -> bool {
        self.pending > 0 || self.downloading > 0 || self.failed > 0
    }

    /// Failed downloads need the broad scope; otherwise only stuck ones are retried
    pub fn suggested_retry_scope(&self) -> RetryScope {
        if self.failed > 0 {
            RetryScope::All
        } else {
            RetryScope::Stuck
        }
    }
}

/// Which unfinished downloads to re-queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryScope {
    #[default]
    Stuck,
    All,
}

impl RetryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryScope::Stuck => "stuck",
            RetryScope::All => "all",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDownloadsResponse {
    pub status: String,
    pub message: String,
}
