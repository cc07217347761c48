//! Filter sub-states for the search view and the library view.

use serde::{Deserialize, Serialize};

use crate::models::{DownloadStatus, LibraryQuery, Paper, PaperSource};

/// Client-side filters over the current search results.
///
/// All filters compose conjunctively; an unset filter passes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Keep papers with at least this many citations
    pub min_citations: Option<u32>,
    /// Keep only papers with a PDF link
    pub open_access: bool,
    /// Keep only papers from this provider
    pub source: Option<PaperSource>,
}

impl SearchFilters {
    pub fn matches(&self, paper: &Paper) -> bool {
        if let Some(min) = self.min_citations {
            if paper.citation_count < min {
                return false;
            }
        }
        if self.open_access && !paper.is_open_access() {
            return false;
        }
        if let Some(source) = self.source {
            if paper.source != source {
                return false;
            }
        }
        true
    }

    /// No filter is active
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }
}

/// Server-side filters for the library listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryFilters {
    pub tag: Option<String>,
    pub status: Option<DownloadStatus>,
    pub min_citations: Option<u32>,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
    pub search: String,
}

impl LibraryFilters {
    /// Listing query for the first page of `limit` entries
    pub fn to_query(&self, limit: u32) -> LibraryQuery {
        LibraryQuery {
            page: None,
            limit: Some(limit),
            tag: self.tag.clone(),
            status: self.status,
            min_citations: self.min_citations,
            year_start: self.year_start,
            year_end: self.year_end,
            search: Some(self.search.clone()).filter(|s| !s.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperBuilder;

    #[test]
    fn test_filters_compose() {
        let paper = PaperBuilder::new("x", PaperSource::Arxiv)
            .citations(10)
            .pdf_url("https://arxiv.org/pdf/1")
            .build();

        assert!(SearchFilters::default().matches(&paper));

        let filters = SearchFilters {
            min_citations: Some(10),
            open_access: true,
            source: Some(PaperSource::Arxiv),
        };
        assert!(filters.matches(&paper));

        let too_strict = SearchFilters {
            min_citations: Some(11),
            ..filters.clone()
        };
        assert!(!too_strict.matches(&paper));

        let other_source = SearchFilters {
            source: Some(PaperSource::Core),
            ..filters
        };
        assert!(!other_source.matches(&paper));
    }

    #[test]
    fn test_open_access_requires_pdf() {
        let closed = PaperBuilder::new("y", PaperSource::CrossRef).build();
        let filters = SearchFilters {
            open_access: true,
            ..Default::default()
        };
        assert!(!filters.matches(&closed));
    }

    #[test]
    fn test_library_filters_to_query() {
        let filters = LibraryFilters {
            status: Some(DownloadStatus::Pending),
            search: "   ".to_string(),
            ..Default::default()
        };
        let query = filters.to_query(100);
        assert_eq!(query.limit, Some(100));
        assert_eq!(query.status, Some(DownloadStatus::Pending));
        assert_eq!(query.search, None);
    }
}
