//! Query matching and ranking.
//!
//! [`SearchEngine`] applies the minimum-length gate, runs the strategy chain
//! for the query kind against a [`GazetteerStore`] and ranks the matches into
//! a [`RankedPage`].
use std::sync::Arc;

pub use error::SearchError;
use error::Result;
pub use rank::{RankedPage, rank};
use serde::{Deserialize, Serialize};
pub use strategy::{Strategy, chain_for, run_chain};
use tracing::{debug, info, instrument};

use crate::{
    config::SearchConfig,
    model::AddressRecord,
    normalize::{digits_only, normalize, normalized_len},
    store::GazetteerStore,
};

mod rank;
pub mod strategy;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum SearchError {
        #[error("Store error: {0}")]
        Store(#[from] crate::store::StoreError),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, SearchError>;
}

/// What a query is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Street name, accent-folded first, raw text as fallback.
    FreeText,
    /// Exact postal code, any formatting.
    PostalCode,
    /// Substring of the neighborhood.
    Neighborhood,
    /// Street name, then neighborhood, locality or postal-code fragment.
    /// Backs the top-level search endpoint.
    Broad,
}

/// A query prepared once for every strategy of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Trimmed input, as typed.
    pub raw: String,
    /// [`normalize`]d input, trimmed.
    pub folded: String,
    /// [`digits_only`] input.
    pub digits: String,
}

impl SearchQuery {
    pub fn new(text: &str) -> Self {
        let raw = text.trim().to_string();
        Self {
            folded: normalize(&raw).trim().to_string(),
            digits: digits_only(&raw),
            raw,
        }
    }
}

/// Search entry point over a shared, read-only gazetteer.
#[derive(Debug)]
pub struct SearchEngine<S> {
    store: Arc<S>,
    config: SearchConfig,
}

impl<S> Clone for SearchEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: GazetteerStore> SearchEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, SearchConfig::default())
    }

    pub fn with_config(store: S, config: SearchConfig) -> Self {
        Self::from_shared(Arc::new(store), config)
    }

    pub const fn from_shared(store: Arc<S>, config: SearchConfig) -> Self {
        Self { store, config }
    }

    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Whether `query` passes the minimum-length gate.
    pub fn is_searchable(&self, query: &str) -> bool {
        normalized_len(query) >= self.config.min_query_len
    }

    /// Page size used for `kind`.
    pub const fn page_size(&self, kind: QueryKind) -> usize {
        match kind {
            QueryKind::Broad => self.config.top_level_page_size,
            QueryKind::FreeText | QueryKind::PostalCode | QueryKind::Neighborhood => {
                self.config.page_size
            }
        }
    }

    /// Unranked matches of the first productive strategy.
    ///
    /// Gated queries return nothing without touching the store.
    #[instrument(name = "Match query", skip(self), level = "debug")]
    pub fn matches(&self, query: &str, kind: QueryKind) -> Result<Vec<AddressRecord>> {
        if !self.is_searchable(query) {
            debug!("Query below minimum length, store not queried");
            return Ok(Vec::new());
        }
        let prepared = SearchQuery::new(query);
        Ok(run_chain(self.store.as_ref(), &prepared, chain_for(kind))?)
    }

    /// Ranked, size-limited page for `query`.
    #[instrument(name = "Search", skip(self), level = "info")]
    pub fn search(&self, query: &str, kind: QueryKind) -> Result<RankedPage> {
        let t_search = std::time::Instant::now();
        let records = self.matches(query, kind)?;
        let page = rank(records, self.page_size(kind));
        info!(
            total = page.total,
            shown = page.shown,
            elapsed = ?t_search.elapsed(),
            "Search complete"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Field, MemoryGazetteer, StoreError};
    use cepmap_data_processing::test_data::sample_rows;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type StoreResult<T> = std::result::Result<T, StoreError>;

    /// Counts every store call and delegates to the sample gazetteer.
    struct CountingStore {
        inner: MemoryGazetteer,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryGazetteer::from_rows(sample_rows()),
                calls: AtomicUsize::new(0),
            }
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl GazetteerStore for CountingStore {
        fn find_by_postal_code(&self, digits: &str) -> StoreResult<Option<AddressRecord>> {
            self.hit();
            self.inner.find_by_postal_code(digits)
        }
        fn contains(&self, field: Field, needle: &str) -> StoreResult<Vec<AddressRecord>> {
            self.hit();
            self.inner.contains(field, needle)
        }
        fn folded_contains(&self, field: Field, needle: &str) -> StoreResult<Vec<AddressRecord>> {
            self.hit();
            self.inner.folded_contains(field, needle)
        }
        fn postal_code_contains(&self, digits: &str) -> StoreResult<Vec<AddressRecord>> {
            self.hit();
            self.inner.postal_code_contains(digits)
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    struct FailingStore;

    impl GazetteerStore for FailingStore {
        fn find_by_postal_code(&self, _: &str) -> StoreResult<Option<AddressRecord>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn contains(&self, _: Field, _: &str) -> StoreResult<Vec<AddressRecord>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn folded_contains(&self, _: Field, _: &str) -> StoreResult<Vec<AddressRecord>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn postal_code_contains(&self, _: &str) -> StoreResult<Vec<AddressRecord>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn len(&self) -> usize {
            0
        }
    }

    fn engine() -> SearchEngine<MemoryGazetteer> {
        SearchEngine::new(MemoryGazetteer::from_rows(sample_rows()))
    }

    fn names(page: &RankedPage) -> Vec<&str> {
        page.records.iter().map(|r| r.street_name.as_str()).collect()
    }

    #[test]
    fn test_short_queries_never_touch_the_store() {
        let engine = SearchEngine::new(CountingStore::new());
        for query in ["", "fl", "  r ", "á.", "77"] {
            for kind in [
                QueryKind::FreeText,
                QueryKind::PostalCode,
                QueryKind::Neighborhood,
                QueryKind::Broad,
            ] {
                let page = engine.search(query, kind).unwrap();
                assert_eq!(page, RankedPage::empty());
            }
        }
        assert_eq!(engine.store().calls.load(Ordering::SeqCst), 0);

        engine.search("flo", QueryKind::FreeText).unwrap();
        assert!(engine.store().calls.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_flo_orders_florida_before_flores() {
        let page = engine().search("flo", QueryKind::FreeText).unwrap();
        assert_eq!(
            names(&page),
            vec!["Avenida Flórida", "Rua das Flores", "Rua Florianópolis"]
        );
    }

    #[test]
    fn test_postal_code_formatting_independence() {
        let engine = engine();
        let hyphen = engine.search("77600-000", QueryKind::PostalCode).unwrap();
        let plain = engine.search("77600000", QueryKind::PostalCode).unwrap();
        assert_eq!(hyphen, plain);
        assert_eq!(hyphen.total, 1);
        assert_eq!(hyphen.records[0].postal_code, "77600-000");
    }

    #[test]
    fn test_prefix_query_matches_postal_code_on_broad_search() {
        let page = engine().search("77600", QueryKind::Broad).unwrap();
        assert!(page.records.iter().any(|r| r.postal_code == "77600-000"));
        assert!(page.records.iter().all(|r| r.postal_code.starts_with("77600")));
    }

    #[test]
    fn test_page_sizes_per_kind() {
        let config = SearchConfig {
            min_query_len: 3,
            page_size: 2,
            top_level_page_size: 4,
        };
        let engine = SearchEngine::with_config(MemoryGazetteer::from_rows(sample_rows()), config);

        let street = engine.search("rua", QueryKind::FreeText).unwrap();
        assert_eq!((street.total, street.shown), (5, 2));

        let broad = engine.search("paraiso", QueryKind::Broad).unwrap();
        assert_eq!((broad.total, broad.shown), (7, 4));
    }

    #[test]
    fn test_store_errors_propagate() {
        let engine = SearchEngine::new(FailingStore);
        let err = engine.search("flores", QueryKind::FreeText).unwrap_err();
        assert!(matches!(
            err,
            SearchError::Store(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_search_query_preparation() {
        let query = SearchQuery::new("  CEP 77.600-000! ");
        assert_eq!(query.raw, "CEP 77.600-000!");
        assert_eq!(query.folded, "cep 77600000");
        assert_eq!(query.digits, "77600000");
    }
}
