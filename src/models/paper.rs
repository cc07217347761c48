//! Paper model representing a single aggregated search result.

use serde::{Deserialize, Serialize};

/// The upstream provider a search result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSource {
    Semantic,
    OpenAlex,
    Arxiv,
    CrossRef,
    Core,
    Manual,
}

impl PaperSource {
    /// All providers, in the order the search service reports them
    pub const ALL: [PaperSource; 6] = [
        PaperSource::Semantic,
        PaperSource::OpenAlex,
        PaperSource::Arxiv,
        PaperSource::CrossRef,
        PaperSource::Core,
        PaperSource::Manual,
    ];

    /// Returns the display name of the provider
    pub fn name(&self) -> &'static str {
        match self {
            PaperSource::Semantic => "Semantic Scholar",
            PaperSource::OpenAlex => "OpenAlex",
            PaperSource::Arxiv => "arXiv",
            PaperSource::CrossRef => "CrossRef",
            PaperSource::Core => "CORE",
            PaperSource::Manual => "Manual",
        }
    }

    /// Returns the wire identifier of the provider
    pub fn id(&self) -> &'static str {
        match self {
            PaperSource::Semantic => "semantic",
            PaperSource::OpenAlex => "openalex",
            PaperSource::Arxiv => "arxiv",
            PaperSource::CrossRef => "crossref",
            PaperSource::Core => "core",
            PaperSource::Manual => "manual",
        }
    }

    /// Parse a wire identifier (case-insensitive)
    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim().to_lowercase();
        Self::ALL.into_iter().find(|s| s.id() == id)
    }
}

impl std::fmt::Display for PaperSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A paper author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A search result as returned by the aggregated search endpoint.
///
/// Papers are sent back verbatim to the ingest endpoints, so the field
/// names mirror the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Paper title
    pub title: String,

    /// Abstract text
    #[serde(default)]
    pub r#abstract: Option<String>,

    /// Publication year
    #[serde(default)]
    pub year: Option<i32>,

    /// Citation count
    #[serde(default)]
    pub citation_count: u32,

    /// Journal or conference
    #[serde(default)]
    pub venue: Option<String>,

    /// Ordered author list
    #[serde(default)]
    pub authors: Vec<Author>,

    /// Provider that produced this result
    pub source: PaperSource,

    /// Stable cross-session identifier (usually a DOI)
    #[serde(default)]
    pub external_id: Option<String>,

    /// Direct PDF URL, present for open-access papers
    #[serde(default)]
    pub pdf_url: Option<String>,
}

impl Paper {
    /// Create a new paper with required fields
    pub fn new(title: impl Into<String>, source: PaperSource) -> Self {
        Self {
            title: title.into(),
            r#abstract: None,
            year: None,
            citation_count: 0,
            venue: None,
            authors: Vec::new(),
            source,
            external_id: None,
            pdf_url: None,
        }
    }

    /// Whether the paper has a downloadable PDF
    pub fn is_open_access(&self) -> bool {
        self.pdf_url.is_some()
    }

    /// Author names joined for display
    pub fn author_names(&self) -> String {
        self.authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    pub fn new(title: impl Into<String>, source: PaperSource) -> Self {
        Self {
            paper: Paper::new(title, source),
        }
    }

    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.paper.r#abstract = Some(text.into());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.paper.year = Some(year);
        self
    }

    pub fn citations(mut self, count: u32) -> Self {
        self.paper.citation_count = count;
        self
    }

    pub fn venue(mut self, venue: impl Into<String>) -> Self {
        self.paper.venue = Some(venue.into());
        self
    }

    /// Append an author
    pub fn author(mut self, name: impl Into<String>) -> Self {
        self.paper.authors.push(Author::new(name));
        self
    }

    pub fn external_id(mut self, id: impl Into<String>) -> Self {
        self.paper.external_id = Some(id.into());
        self
    }

    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        self.paper.pdf_url = Some(url.into());
        self
    }

    pub fn build(self) -> Paper {
        self.paper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_builder() {
        let paper = PaperBuilder::new("Attention Is All You Need", PaperSource::Semantic)
            .author("Ashish Vaswani")
            .author("Noam Shazeer")
            .year(2017)
            .citations(90000)
            .external_id("10.48550/arXiv.1706.03762")
            .pdf_url("https://arxiv.org/pdf/1706.03762")
            .build();

        assert_eq!(paper.year, Some(2017));
        assert_eq!(paper.citation_count, 90000);
        assert!(paper.is_open_access());
        assert_eq!(paper.author_names(), "Ashish Vaswani, Noam Shazeer");
    }

    #[test]
    fn test_paper_wire_format() {
        let json = r#"{
            "title": "Deep Residual Learning",
            "abstract": null,
            "year": 2016,
            "citation_count": 12,
            "venue": "CVPR",
            "authors": [{"name": "Kaiming He"}],
            "source": "openalex",
            "external_id": "10.1109/CVPR.2016.90",
            "pdf_url": null
        }"#;

        let paper: Paper = serde_json::from_str(json).unwrap();
        assert_eq!(paper.source, PaperSource::OpenAlex);
        assert_eq!(paper.r#abstract, None);
        assert!(!paper.is_open_access());

        let value = serde_json::to_value(&paper).unwrap();
        assert_eq!(value["source"], "openalex");
        assert!(value.get("abstract").is_some());
    }

    #[test]
    fn test_source_from_id() {
        assert_eq!(PaperSource::from_id("CrossRef"), Some(PaperSource::CrossRef));
        assert_eq!(PaperSource::from_id(" arxiv "), Some(PaperSource::Arxiv));
        assert_eq!(PaperSource::from_id("pubmed"), None);
    }
}
