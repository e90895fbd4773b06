//! Visit type catalog: search, pagination, and the recommended/all switch.
//!
//! Filtering is pure and synchronous. The same filter serves both the
//! recommended subset (computed elsewhere from the patient's program enrollment)
//! and the full configured list; it does not know which one it was given.

use crate::constants::{ALL_TAB_INDEX, RECOMMENDED_TAB_INDEX};
use serde::{Deserialize, Serialize};

/// A selectable visit type. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitType {
    pub uuid: String,
    pub display: String,
}

impl VisitType {
    pub fn new(uuid: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            display: display.into(),
        }
    }
}

/// Entries whose display name contains `query`, ignoring case, in catalog order.
///
/// An empty query returns the whole catalog.
pub fn filter_visit_types(catalog: &[VisitType], query: &str) -> Vec<VisitType> {
    if query.is_empty() {
        return catalog.to_vec();
    }

    let needle = query.to_lowercase();
    catalog
        .iter()
        .filter(|visit_type| visit_type.display.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

// ============================================================================
// PAGINATION
// ============================================================================

/// One page of results. Pages are 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub current_page: usize,
    pub total_pages: usize,
}

/// Slice `items` into the requested page.
///
/// Page numbers below 1 select the first page and numbers past the end select
/// the last one. An empty input yields a single empty page.
pub fn paginate<T: Clone>(items: &[T], page_size: usize, page: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);
    let current_page = page.clamp(1, total_pages);

    let start = (current_page - 1) * page_size;
    let end = (start + page_size).min(items.len());

    Page {
        results: items[start..end].to_vec(),
        current_page,
        total_pages,
    }
}

// ============================================================================
// RECOMMENDED / ALL
// ============================================================================

/// Which visit-type list the content switcher is showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitTypeTab {
    Recommended,
    All,
}

impl VisitTypeTab {
    /// Resolve the switcher index, honouring the recommended-tab toggle.
    ///
    /// With the toggle off the "all" list is always shown regardless of index.
    pub fn from_index(index: u8, recommended_enabled: bool) -> Self {
        if recommended_enabled && index == RECOMMENDED_TAB_INDEX {
            Self::Recommended
        } else {
            Self::All
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Recommended => RECOMMENDED_TAB_INDEX,
            Self::All => ALL_TAB_INDEX,
        }
    }
}

/// Recommended visit types, computed by a collaborator from the patient's
/// program enrollment and the selected location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecommendedVisitTypes {
    Loading,
    Ready(Vec<VisitType>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisitTypeCatalog {
    all: Vec<VisitType>,
    recommended: RecommendedVisitTypes,
}

impl VisitTypeCatalog {
    pub fn new(all: Vec<VisitType>) -> Self {
        Self {
            all,
            recommended: RecommendedVisitTypes::Loading,
        }
    }

    pub fn all(&self) -> &[VisitType] {
        &self.all
    }

    pub fn set_recommended(&mut self, recommended: Vec<VisitType>) {
        self.recommended = RecommendedVisitTypes::Ready(recommended);
    }

    /// Forget the recommended list, e.g. after the enrollment or location changed.
    pub fn reset_recommended(&mut self) {
        self.recommended = RecommendedVisitTypes::Loading;
    }

    /// The list backing `tab`, or `None` while the recommended list is loading.
    pub fn source(&self, tab: VisitTypeTab) -> Option<&[VisitType]> {
        match (tab, &self.recommended) {
            (VisitTypeTab::All, _) => Some(&self.all),
            (VisitTypeTab::Recommended, RecommendedVisitTypes::Ready(types)) => Some(types),
            (VisitTypeTab::Recommended, RecommendedVisitTypes::Loading) => None,
        }
    }

    /// Search and paginate the list backing `tab`.
    pub fn search(
        &self,
        tab: VisitTypeTab,
        query: &str,
        page_size: usize,
        page: usize,
    ) -> Option<Page<VisitType>> {
        self.source(tab)
            .map(|types| paginate(&filter_visit_types(types, query), page_size, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<VisitType> {
        vec![
            VisitType::new("vt-1", "Outpatient Visit"),
            VisitType::new("vt-2", "HIV Return Visit"),
            VisitType::new("vt-3", "Facility Visit"),
            VisitType::new("vt-4", "hiv initial"),
        ]
    }

    #[test]
    fn empty_query_returns_catalog_unchanged() {
        assert_eq!(filter_visit_types(&catalog(), ""), catalog());
    }

    #[test]
    fn empty_catalog_filters_to_empty() {
        assert!(filter_visit_types(&[], "hiv").is_empty());
    }

    #[test]
    fn matches_case_insensitively_and_keeps_order() {
        let result = filter_visit_types(&catalog(), "HIV");
        let uuids: Vec<&str> = result.iter().map(|v| v.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["vt-2", "vt-4"]);
    }

    #[test]
    fn every_result_contains_query_and_nothing_else_does() {
        let all = catalog();
        for query in ["visit", "V", "return", "zzz", "it"] {
            let result = filter_visit_types(&all, query);
            let needle = query.to_lowercase();
            for entry in &all {
                let matches = entry.display.to_lowercase().contains(&needle);
                assert_eq!(result.contains(entry), matches, "query {query:?}");
            }
        }
    }

    #[test]
    fn filtering_is_idempotent() {
        for query in ["", "hiv", "Visit", "o", "none"] {
            let once = filter_visit_types(&catalog(), query);
            let twice = filter_visit_types(&once, query);
            assert_eq!(once, twice, "query {query:?}");
        }
    }

    #[test]
    fn paginates_and_clamps() {
        let items: Vec<u32> = (1..=12).collect();

        let first = paginate(&items, 5, 1);
        assert_eq!(first.results, vec![1, 2, 3, 4, 5]);
        assert_eq!(first.total_pages, 3);

        let last = paginate(&items, 5, 3);
        assert_eq!(last.results, vec![11, 12]);

        let past_end = paginate(&items, 5, 9);
        assert_eq!(past_end.current_page, 3);

        let before_start = paginate(&items, 5, 0);
        assert_eq!(before_start.current_page, 1);
    }

    #[test]
    fn empty_input_has_one_empty_page() {
        let page = paginate::<u32>(&[], 5, 2);
        assert!(page.results.is_empty());
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn tab_ignores_index_when_recommended_disabled() {
        assert_eq!(VisitTypeTab::from_index(0, true), VisitTypeTab::Recommended);
        assert_eq!(VisitTypeTab::from_index(1, true), VisitTypeTab::All);
        assert_eq!(VisitTypeTab::from_index(0, false), VisitTypeTab::All);
    }

    #[test]
    fn recommended_source_is_unavailable_while_loading() {
        let mut types = VisitTypeCatalog::new(catalog());
        assert!(types.source(VisitTypeTab::Recommended).is_none());
        assert_eq!(types.source(VisitTypeTab::All).map(<[_]>::len), Some(4));

        types.set_recommended(vec![VisitType::new("vt-2", "HIV Return Visit")]);
        let page = types
            .search(VisitTypeTab::Recommended, "return", 5, 1)
            .expect("recommended loaded");
        assert_eq!(page.results.len(), 1);

        types.reset_recommended();
        assert!(types.search(VisitTypeTab::Recommended, "", 5, 1).is_none());
    }
}
