//! Search and ingestion request/response models.

use serde::{Deserialize, Serialize};

use crate::models::Paper;

/// Search request sent to the aggregated search endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_start: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_end: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_citations: Option<u32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn year_start(mut self, year: i32) -> Self {
        self.year_start = Some(year);
        self
    }

    pub fn year_end(mut self, year: i32) -> Self {
        self.year_end = Some(year);
        self
    }

    pub fn min_citations(mut self, count: u32) -> Self {
        self.min_citations = Some(count);
        self
    }
}

/// Per-search statistics produced by the aggregator.
///
/// Immutable once received; replaced by the next search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMeta {
    #[serde(default)]
    pub raw_semantic: u32,
    #[serde(default)]
    pub raw_openalex: u32,
    #[serde(default)]
    pub raw_arxiv: u32,
    #[serde(default)]
    pub raw_crossref: u32,
    #[serde(default)]
    pub raw_core: u32,
    /// Results dropped by the relevance filter
    #[serde(default)]
    pub relevance_filtered: u32,
    #[serde(default)]
    pub duplicates_removed: u32,
    #[serde(default)]
    pub total: u32,
}

impl SearchMeta {
    /// Sum of the raw per-provider counts
    pub fn raw_total(&self) -> u32 {
        self.raw_semantic + self.raw_openalex + self.raw_arxiv + self.raw_crossref + self.raw_core
    }
}

/// Search response containing results in relevance order plus statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<Paper>,
    pub meta: SearchMeta,
}

impl SearchResponse {
    pub fn new(results: Vec<Paper>) -> Self {
        let meta = SearchMeta {
            total: results.len() as u32,
            ..Default::default()
        };
        Self { results, meta }
    }

    pub fn meta(mut self, meta: SearchMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Single-paper ingest payload
#[derive(Debug, Clone, Serialize)]
pub struct IngestRequest<'a> {
    pub paper: &'a Paper,
    pub search_query: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub entry_id: i64,
}

/// Bulk ingest payload, capped at the chunk size by the caller
#[derive(Debug, Clone, Serialize)]
pub struct BulkIngestRequest<'a> {
    pub papers: &'a [Paper],
    pub search_query: &'a str,
}

/// Outcome of one bulk ingest call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIngestResponse {
    pub status: String,
    #[serde(default)]
    pub added_count: u32,
    #[serde(default)]
    pub duplicate_count: u32,
    #[serde(default)]
    pub failed_count: u32,
    #[serde(default)]
    pub entry_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckLibraryRequest<'a> {
    pub external_ids: &'a [String],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckLibraryResponse {
    #[serde(default)]
    pub saved_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperSource;

    #[test]
    fn test_search_request_omits_unset_filters() {
        let request = SearchRequest::new("graph neural networks").year_start(2020);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["query"], "graph neural networks");
        assert_eq!(value["year_start"], 2020);
        assert!(value.get("year_end").is_none());
        assert!(value.get("min_citations").is_none());
    }

    #[test]
    fn test_search_meta_defaults_missing_counts() {
        let meta: SearchMeta =
            serde_json::from_str(r#"{"raw_semantic": 40, "raw_arxiv": 10, "total": 45}"#).unwrap();

        assert_eq!(meta.raw_total(), 50);
        assert_eq!(meta.duplicates_removed, 0);
        assert_eq!(meta.relevance_filtered, 0);
    }

    #[test]
    fn test_bulk_request_shape() {
        let papers = vec![Paper::new("A", PaperSource::Core)];
        let request = BulkIngestRequest {
            papers: &papers,
            search_query: "q",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["papers"].as_array().map(|a| a.len()), Some(1));
        assert_eq!(value["search_query"], "q");
    }
}
