//! Identity of search results and detail-pane selections.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use crate::models::Paper;

const FALLBACK_PREFIX: &str = "paper-";
const LIBRARY_PREFIX: &str = "library-";

/// A search result as held by the store.
///
/// The id is fixed when the result enters the store: the external id when
/// there is one, otherwise `paper-<seq>` where `seq` is the arrival
/// position in the result set. Later filtering, paging or reordering never
/// changes it. Ids are unique within one result set (see [`assign_ids`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    id: String,
    seq: usize,
    paper: Paper,
}

impl ResultItem {
    pub fn new(seq: usize, paper: Paper) -> Self {
        let id = match paper.external_id.as_deref().filter(|id| !id.is_empty()) {
            Some(external) => external.to_string(),
            None => fallback_id(seq),
        };
        Self { id, seq, paper }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Arrival position in the unfiltered result set
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn paper(&self) -> &Paper {
        &self.paper
    }

    /// External id usable against the library service, if any
    pub fn external_id(&self) -> Option<&str> {
        self.paper.external_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Wrap a freshly received result set, numbering results from zero.
///
/// The first result carrying an external id keeps it as its id; later
/// results repeating that external id fall back to `paper-<seq>`, so every
/// row gets its own checkbox.
pub fn assign_ids(papers: Vec<Paper>) -> Vec<ResultItem> {
    let mut taken = HashSet::with_capacity(papers.len());
    papers
        .into_iter()
        .enumerate()
        .map(|(seq, paper)| {
            let mut item = ResultItem::new(seq, paper);
            if taken.contains(&item.id) {
                item.id = unused_fallback_id(seq, &taken);
            }
            taken.insert(item.id.clone());
            item
        })
        .collect()
}

fn unused_fallback_id(seq: usize, taken: &HashSet<String>) -> String {
    let base = fallback_id(seq);
    let mut id = base.clone();
    let mut n = 1;
    while taken.contains(&id) {
        id = format!("{}-{}", base, n);
        n += 1;
    }
    id
}

fn fallback_id(seq: usize) -> String {
    format!("{}{}", FALLBACK_PREFIX, seq)
}

/// What the detail pane is showing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemId {
    /// A search result, by its [`ResultItem::id`]
    Search(String),
    /// A library entry, by its server id
    Library(i64),
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemId::Search(id) => f.write_str(id),
            ItemId::Library(id) => write!(f, "{}{}", LIBRARY_PREFIX, id),
        }
    }
}

impl FromStr for ItemId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.strip_prefix(LIBRARY_PREFIX)
            .and_then(|rest| rest.parse::<i64>().ok())
            .map(ItemId::Library)
            .unwrap_or_else(|| ItemId::Search(s.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::make_paper;

    #[test]
    fn test_ids_prefer_external_id() {
        let items = assign_ids(vec![
            make_paper("a", Some("10.1/x")),
            make_paper("b", None),
            make_paper("c", Some("")),
        ]);

        assert_eq!(items[0].id(), "10.1/x");
        assert_eq!(items[1].id(), "paper-1");
        assert_eq!(items[2].id(), "paper-2");
        assert_eq!(items[2].external_id(), None);
    }

    #[test]
    fn test_repeated_external_id_gets_own_id() {
        let items = assign_ids(vec![
            make_paper("a", Some("10.1/x")),
            make_paper("b", Some("10.1/x")),
            make_paper("c", Some("paper-3")),
            make_paper("d", None),
        ]);

        let ids: Vec<&str> = items.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["10.1/x", "paper-1", "paper-3", "paper-3-1"]);
        assert_eq!(items[1].external_id(), Some("10.1/x"));
    }

    #[test]
    fn test_item_id_round_trip() {
        assert_eq!("library-42".parse::<ItemId>().unwrap(), ItemId::Library(42));
        assert_eq!(
            "paper-3".parse::<ItemId>().unwrap(),
            ItemId::Search("paper-3".to_string())
        );
        assert_eq!(
            "library-abc".parse::<ItemId>().unwrap(),
            ItemId::Search("library-abc".to_string())
        );
        assert_eq!(ItemId::Library(7).to_string(), "library-7");
    }
}
