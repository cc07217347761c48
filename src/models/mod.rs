//! Core data models for search results, library entries and API payloads.

mod library;
mod paper;
mod search;

pub use library::{
    DownloadStats, DownloadStatus, FailedEntry, LibraryEntry, LibraryListResponse, LibraryQuery,
    PaperDetail, RetryDownloadsResponse, RetryScope, Tag,
};
pub use paper::{Author, Paper, PaperBuilder, PaperSource};
pub use search::{
    BulkIngestRequest, BulkIngestResponse, CheckLibraryRequest, CheckLibraryResponse,
    IngestRequest, IngestResponse, SearchMeta, SearchRequest, SearchResponse,
};
