//! Filter and pagination derivation.
//!
//! Pure functions over the raw results and the filter state. Nothing here is
//! cached: the store recomputes the view on every read, so a view can never
//! be older than the state it was derived from.

use super::filters::SearchFilters;
use super::item::ResultItem;

/// Filtered results in their original relevance order
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView<'a> {
    pub visible: Vec<&'a ResultItem>,
    pub total_count: usize,
}

/// Apply `filters` to `results`, preserving input order
pub fn derive<'a>(results: &'a [ResultItem], filters: &SearchFilters) -> DerivedView<'a> {
    let visible: Vec<&ResultItem> = results
        .iter()
        .filter(|item| filters.matches(item.paper()))
        .collect();
    let total_count = visible.len();

    DerivedView {
        visible,
        total_count,
    }
}

/// Number of pages for `total` items; at least one, even when empty
pub fn page_count(total: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    total.div_ceil(page_size).max(1)
}

/// Clamp `page` into `[1, page_count]`
pub fn clamp_page(page: usize, total: usize, page_size: usize) -> usize {
    page.clamp(1, page_count(total, page_size))
}

/// One page of a derived view
#[derive(Debug, Clone, PartialEq)]
pub struct PageView<'a> {
    pub items: Vec<&'a ResultItem>,
    /// 1-based page number
    pub page: usize,
    pub total_pages: usize,
    /// Filtered result count across all pages
    pub total_count: usize,
    /// Index of the first item within the filtered results
    pub start: usize,
    /// One past the index of the last item
    pub end: usize,
}

impl PageView<'_> {
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// Slice `view` to `page` (clamped into range)
pub fn paginate<'a>(view: DerivedView<'a>, page: usize, page_size: usize) -> PageView<'a> {
    let page_size = page_size.max(1);
    let total_count = view.total_count;
    let page = clamp_page(page, total_count, page_size);
    let start = ((page - 1) * page_size).min(total_count);
    let end = (page * page_size).min(total_count);

    PageView {
        items: view.visible[start..end].to_vec(),
        page,
        total_pages: page_count(total_count, page_size),
        total_count,
        start,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperBuilder, PaperSource};
    use crate::store::item::assign_ids;

    fn results(n: usize) -> Vec<ResultItem> {
        assign_ids(
            (0..n)
                .map(|i| {
                    let source = if i % 2 == 0 {
                        PaperSource::Semantic
                    } else {
                        PaperSource::OpenAlex
                    };
                    PaperBuilder::new(format!("p{}", i), source)
                        .citations(i as u32)
                        .build()
                })
                .collect(),
        )
    }

    #[test]
    fn test_no_filters_returns_everything_in_order() {
        let items = results(5);
        let view = derive(&items, &SearchFilters::default());
        assert_eq!(view.total_count, 5);
        let seqs: Vec<usize> = view.visible.iter().map(|i| i.seq()).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_visible_never_exceeds_total() {
        let items = results(20);
        let combos = [
            SearchFilters::default(),
            SearchFilters {
                min_citations: Some(5),
                ..Default::default()
            },
            SearchFilters {
                open_access: true,
                ..Default::default()
            },
            SearchFilters {
                source: Some(PaperSource::OpenAlex),
                min_citations: Some(10),
                open_access: false,
            },
        ];
        for filters in &combos {
            let view = derive(&items, filters);
            assert!(view.total_count <= items.len());
            assert!(view.visible.iter().all(|i| filters.matches(i.paper())));
        }
    }

    #[test]
    fn test_filter_preserves_relative_order() {
        let items = results(10);
        let filters = SearchFilters {
            source: Some(PaperSource::OpenAlex),
            ..Default::default()
        };
        let seqs: Vec<usize> = derive(&items, &filters)
            .visible
            .iter()
            .map(|i| i.seq())
            .collect();
        assert_eq!(seqs, vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_page_count_minimum_one() {
        assert_eq!(page_count(0, 100), 1);
        assert_eq!(page_count(100, 100), 1);
        assert_eq!(page_count(101, 100), 2);
        assert_eq!(page_count(250, 100), 3);
    }

    #[test]
    fn test_paginate_last_page_is_partial() {
        let items = results(250);
        let page = paginate(derive(&items, &SearchFilters::default()), 3, 100);
        assert_eq!(page.items.len(), 50);
        assert_eq!(page.start, 200);
        assert_eq!(page.end, 250);
        assert!(!page.has_next());
        assert!(page.has_prev());
    }

    #[test]
    fn test_paginate_clamps_out_of_range_page() {
        let items = results(30);
        let page = paginate(derive(&items, &SearchFilters::default()), 9, 10);
        assert_eq!(page.page, 3);
        assert_eq!(page.ids().len(), 10);

        let empty: Vec<ResultItem> = Vec::new();
        let page = paginate(derive(&empty, &SearchFilters::default()), 4, 10);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(page.is_empty());
    }
}
