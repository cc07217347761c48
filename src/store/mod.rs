//! Client-side application state.
//!
//! [`UiState`] holds everything the views render. Its fields are private and
//! every mutation goes through a method, so the reset rules (new results
//! clear paging, selection and filters; filter changes reset the page) hold
//! no matter who calls in. [`Store`] shares one `UiState` between the engine
//! and its subscribers and bumps a revision on every [`Store::update`].

mod filters;
mod item;
mod selection;
pub mod view;

pub use filters::{LibraryFilters, SearchFilters};
pub use item::{assign_ids, ItemId, ResultItem};
pub use selection::Selection;
pub use view::{DerivedView, PageView};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::models::{
    DownloadStats, DownloadStatus, LibraryEntry, LibraryListResponse, Paper, PaperSource,
    SearchMeta,
};
use crate::sync::IngestSummary;

/// Which panel is in front
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Search,
    Library,
}

/// Progress of the bulk ingestion flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BatchState {
    #[default]
    Idle,
    /// Waiting for the user to confirm "add all"
    Confirming { candidates: usize, chunks: usize },
    /// Sending chunk `chunk` (1-based) of `total_chunks`
    Running { chunk: usize, total_chunks: usize },
}

impl BatchState {
    pub fn is_idle(&self) -> bool {
        matches!(self, BatchState::Idle)
    }
}

/// Last fetched library listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryView {
    pub items: Vec<LibraryEntry>,
    pub total: u32,
}

/// Everything the views render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    active_tab: Tab,
    selected_item: Option<ItemId>,

    search_results: Vec<ResultItem>,
    is_searching: bool,
    last_search_query: String,
    search_meta: Option<SearchMeta>,
    search_generation: u64,

    current_page: usize,
    items_per_page: usize,
    search_filters: SearchFilters,
    selection: Selection,
    saved_external_ids: BTreeSet<String>,

    library_filters: LibraryFilters,
    library: LibraryView,
    library_revision: u64,
    download_stats: Option<DownloadStats>,

    batch: BatchState,
    last_summary: Option<IngestSummary>,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new(100)
    }
}

impl UiState {
    pub fn new(items_per_page: usize) -> Self {
        Self {
            active_tab: Tab::default(),
            selected_item: None,
            search_results: Vec::new(),
            is_searching: false,
            last_search_query: String::new(),
            search_meta: None,
            search_generation: 0,
            current_page: 1,
            items_per_page: items_per_page.max(1),
            search_filters: SearchFilters::default(),
            selection: Selection::new(),
            saved_external_ids: BTreeSet::new(),
            library_filters: LibraryFilters::default(),
            library: LibraryView::default(),
            library_revision: 0,
            download_stats: None,
            batch: BatchState::Idle,
            last_summary: None,
        }
    }

    // ---- navigation ----

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    /// Switch panels; the detail pane closes
    pub fn set_active_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
        self.selected_item = None;
    }

    pub fn selected_item(&self) -> Option<&ItemId> {
        self.selected_item.as_ref()
    }

    pub fn set_selected_item(&mut self, item: Option<ItemId>) {
        self.selected_item = item;
    }

    // ---- search lifecycle ----

    /// Mark a search as in flight and return its generation.
    ///
    /// Only the response carrying the latest generation may be applied.
    pub fn begin_search(&mut self, query: &str) -> u64 {
        self.search_generation += 1;
        self.is_searching = true;
        self.last_search_query = query.to_string();
        self.selected_item = None;
        self.search_generation
    }

    pub fn is_current_search(&self, generation: u64) -> bool {
        self.search_generation == generation
    }

    /// Apply the result of the search started as `generation`.
    ///
    /// Returns false, leaving the state untouched, if a newer search has
    /// started since.
    pub fn finish_search(
        &mut self,
        generation: u64,
        results: Vec<Paper>,
        meta: Option<SearchMeta>,
    ) -> bool {
        if !self.is_current_search(generation) {
            return false;
        }
        self.replace_results(results);
        self.search_meta = meta;
        self.is_searching = false;
        true
    }

    /// Stop showing the search `generation` as loading, keeping the current
    /// results. Returns false if a newer search owns the flag.
    pub fn abandon_search(&mut self, generation: u64) -> bool {
        if !self.is_current_search(generation) || !self.is_searching {
            return false;
        }
        self.is_searching = false;
        true
    }

    /// Install a new result set, resetting paging, selection, meta and
    /// search filters
    pub fn replace_results(&mut self, results: Vec<Paper>) {
        self.search_results = assign_ids(results);
        self.current_page = 1;
        self.selection.clear();
        self.search_meta = None;
        self.search_filters = SearchFilters::default();
        if matches!(self.selected_item, Some(ItemId::Search(_))) {
            self.selected_item = None;
        }
    }

    pub fn search_results(&self) -> &[ResultItem] {
        &self.search_results
    }

    pub fn result(&self, id: &str) -> Option<&ResultItem> {
        self.search_results.iter().find(|item| item.id() == id)
    }

    pub fn is_searching(&self) -> bool {
        self.is_searching
    }

    pub fn last_search_query(&self) -> &str {
        &self.last_search_query
    }

    pub fn search_meta(&self) -> Option<&SearchMeta> {
        self.search_meta.as_ref()
    }

    // ---- filters and paging ----

    pub fn search_filters(&self) -> &SearchFilters {
        &self.search_filters
    }

    pub fn set_min_citations(&mut self, min: Option<u32>) {
        self.search_filters.min_citations = min;
        self.current_page = 1;
    }

    pub fn set_open_access(&mut self, open_access: bool) {
        self.search_filters.open_access = open_access;
        self.current_page = 1;
    }

    pub fn set_source_filter(&mut self, source: Option<PaperSource>) {
        self.search_filters.source = source;
        self.current_page = 1;
    }

    pub fn reset_filters(&mut self) {
        self.search_filters = SearchFilters::default();
        self.current_page = 1;
    }

    /// Filtered results, derived fresh
    pub fn visible(&self) -> DerivedView<'_> {
        view::derive(&self.search_results, &self.search_filters)
    }

    /// Current page of the filtered results
    pub fn page(&self) -> PageView<'_> {
        view::paginate(self.visible(), self.current_page, self.items_per_page)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn total_pages(&self) -> usize {
        view::page_count(self.visible().total_count, self.items_per_page)
    }

    /// Jump to `page`, clamped into range. Returns the page now shown.
    pub fn set_page(&mut self, page: usize) -> usize {
        self.current_page = view::clamp_page(
            page,
            self.visible().total_count,
            self.items_per_page,
        );
        self.current_page
    }

    pub fn next_page(&mut self) -> usize {
        self.set_page(self.current_page + 1)
    }

    pub fn prev_page(&mut self) -> usize {
        self.set_page(self.current_page.saturating_sub(1))
    }

    // ---- selection ----

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Toggle a result's checkbox. Returns `None` when `id` is not part of
    /// the current results, otherwise whether it is now selected.
    pub fn toggle_selection(&mut self, id: &str) -> Option<bool> {
        self.result(id)?;
        Some(self.selection.toggle(id))
    }

    /// Select exactly the items on the current page
    pub fn select_all_on_page(&mut self) {
        let ids: Vec<String> = self
            .page()
            .items
            .iter()
            .map(|item| item.id().to_string())
            .collect();
        self.selection.replace(ids);
    }

    /// Header checkbox: clear when the page is fully selected, else select the page
    pub fn toggle_all_on_page(&mut self) {
        if self.all_on_page_selected() {
            self.selection.clear();
        } else {
            self.select_all_on_page();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn all_on_page_selected(&self) -> bool {
        let page = self.page();
        self.selection.contains_all(page.ids())
    }

    /// Papers for the selected ids, in result order, re-read from the
    /// current results
    pub fn selected_papers(&self) -> Vec<Paper> {
        self.search_results
            .iter()
            .filter(|item| self.selection.contains(item.id()))
            .map(|item| item.paper().clone())
            .collect()
    }

    /// Every paper passing the active filters, across all pages
    pub fn visible_papers(&self) -> Vec<Paper> {
        self.visible()
            .visible
            .into_iter()
            .map(|item| item.paper().clone())
            .collect()
    }

    // ---- saved status ----

    /// Merge confirmed-saved ids. Never removes.
    pub fn mark_saved<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.saved_external_ids.len();
        self.saved_external_ids
            .extend(ids.into_iter().map(Into::into));
        self.saved_external_ids.len() - before
    }

    pub fn is_saved(&self, item: &ResultItem) -> bool {
        item.external_id()
            .is_some_and(|id| self.saved_external_ids.contains(id))
    }

    pub fn saved_external_ids(&self) -> &BTreeSet<String> {
        &self.saved_external_ids
    }

    /// Saved results among the current result set
    pub fn saved_in_results(&self) -> usize {
        self.search_results
            .iter()
            .filter(|item| self.is_saved(item))
            .count()
    }

    // ---- library ----

    pub fn library_filters(&self) -> &LibraryFilters {
        &self.library_filters
    }

    pub fn set_library_filters(&mut self, filters: LibraryFilters) {
        self.library_filters = filters;
        self.library_revision += 1;
    }

    pub fn set_library_status(&mut self, status: Option<DownloadStatus>) {
        self.library_filters.status = status;
        self.library_revision += 1;
    }

    pub fn set_library_tag(&mut self, tag: Option<String>) {
        self.library_filters.tag = tag;
        self.library_revision += 1;
    }

    pub fn set_library_search(&mut self, search: impl Into<String>) {
        self.library_filters.search = search.into();
        self.library_revision += 1;
    }

    pub fn library(&self) -> &LibraryView {
        &self.library
    }

    pub fn set_library_listing(&mut self, listing: LibraryListResponse) {
        self.library = LibraryView {
            items: listing.items,
            total: listing.total,
        };
    }

    /// Bumped whenever the cached listing is known to be stale
    pub fn library_revision(&self) -> u64 {
        self.library_revision
    }

    pub fn invalidate_library(&mut self) {
        self.library_revision += 1;
    }

    pub fn download_stats(&self) -> Option<&DownloadStats> {
        self.download_stats.as_ref()
    }

    pub fn set_download_stats(&mut self, stats: DownloadStats) {
        self.download_stats = Some(stats);
    }

    // ---- batch ----

    pub fn batch(&self) -> BatchState {
        self.batch
    }

    pub fn set_batch(&mut self, batch: BatchState) {
        self.batch = batch;
    }

    pub fn last_summary(&self) -> Option<&IngestSummary> {
        self.last_summary.as_ref()
    }

    pub fn set_last_summary(&mut self, summary: IngestSummary) {
        self.last_summary = Some(summary);
    }
}

/// Shared handle to the application state.
///
/// Cloning is cheap; all clones see the same state. Subscribers get a
/// revision number that increases after every update.
#[derive(Debug, Clone)]
pub struct Store {
    state: Arc<Mutex<UiState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(UiState::default())
    }
}

impl Store {
    pub fn new(state: UiState) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(state)),
            revision: Arc::new(revision),
        }
    }

    pub fn with_page_size(items_per_page: usize) -> Self {
        Self::new(UiState::new(items_per_page))
    }

    fn lock(&self) -> MutexGuard<'_, UiState> {
        // A panic inside an update leaves the state consistent per field; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a mutation and notify subscribers.
    ///
    /// This is the only way state changes. The lock is released before
    /// subscribers are woken.
    pub fn update<R>(&self, f: impl FnOnce(&mut UiState) -> R) -> R {
        let result = {
            let mut state = self.lock();
            f(&mut state)
        };
        self.revision.send_modify(|rev| *rev += 1);
        result
    }

    /// Read without notifying
    pub fn read<R>(&self, f: impl FnOnce(&UiState) -> R) -> R {
        let state = self.lock();
        f(&state)
    }

    /// Owned copy of the whole state
    pub fn snapshot(&self) -> UiState {
        self.read(UiState::clone)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn toggle_selection(&self, id: &str) -> Option<bool> {
        self.update(|s| s.toggle_selection(id))
    }

    pub fn select_all_on_page(&self) {
        self.update(UiState::select_all_on_page)
    }

    pub fn toggle_all_on_page(&self) {
        self.update(UiState::toggle_all_on_page)
    }

    pub fn clear_selection(&self) {
        self.update(UiState::clear_selection)
    }

    pub fn set_page(&self, page: usize) -> usize {
        self.update(|s| s.set_page(page))
    }

    pub fn next_page(&self) -> usize {
        self.update(UiState::next_page)
    }

    pub fn prev_page(&self) -> usize {
        self.update(UiState::prev_page)
    }

    pub fn set_min_citations(&self, min: Option<u32>) {
        self.update(|s| s.set_min_citations(min))
    }

    pub fn set_open_access(&self, open_access: bool) {
        self.update(|s| s.set_open_access(open_access))
    }

    pub fn set_source_filter(&self, source: Option<PaperSource>) {
        self.update(|s| s.set_source_filter(source))
    }

    pub fn set_active_tab(&self, tab: Tab) {
        self.update(|s| s.set_active_tab(tab))
    }
}
