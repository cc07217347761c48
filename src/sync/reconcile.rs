//! Saved-status reconciliation.
//!
//! Asks the library which of the current results it already holds. Only
//! DOI-shaped external ids are sent; provider-native ids and positional
//! fallbacks cannot be checked.

use regex::Regex;
use std::sync::LazyLock;

use crate::client::{ApiError, LibraryApi};
use crate::store::ResultItem;

static DOI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^10\.\d+/\S+$").expect("DOI pattern is valid"));

/// Whether the library can be asked about `external_id`
pub fn is_checkable(external_id: &str) -> bool {
    DOI_PATTERN.is_match(external_id)
}

/// Checkable external ids of `items`, deduplicated, in result order
pub fn checkable_ids<'a, I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ResultItem>,
{
    let mut ids: Vec<String> = Vec::new();
    for id in items.into_iter().filter_map(ResultItem::external_id) {
        if is_checkable(id) && !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Return the subset of `candidates` the library already holds.
///
/// Makes no request when there is nothing to check.
pub async fn reconcile(
    api: &dyn LibraryApi,
    candidates: &[String],
) -> Result<Vec<String>, ApiError> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let saved = api.check_saved(candidates).await?;
    tracing::debug!(
        "Library holds {} of {} checked papers",
        saved.len(),
        candidates.len()
    );
    Ok(saved)
}
