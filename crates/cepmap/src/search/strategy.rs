//! Ordered matching strategies.
//!
//! Every query kind maps to a fixed chain of strategies sharing one signature.
//! The chain is evaluated in order and the first strategy that yields at least
//! one record wins; later strategies are not consulted.
use ahash::AHashSet;
use tracing::{debug, trace};

use super::{QueryKind, SearchQuery};
use crate::{
    model::AddressRecord,
    store::{Field, GazetteerStore, StoreError},
};

type StrategyResult = std::result::Result<Vec<AddressRecord>, StoreError>;

/// Postal-code digit fragments shorter than this are not matched by the broad chain.
const MIN_POSTAL_FRAGMENT: usize = 3;

#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub run: fn(&dyn GazetteerStore, &SearchQuery) -> StrategyResult,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Strategy").field(&self.name).finish()
    }
}

/// Accent-folded substring match on the street name.
pub const FOLDED_STREET: Strategy = Strategy {
    name: "folded_street",
    run: folded_street,
};

/// Case-insensitive substring match on the raw street name, diacritics kept.
pub const PLAIN_STREET: Strategy = Strategy {
    name: "plain_street",
    run: plain_street,
};

pub const EXACT_POSTAL_CODE: Strategy = Strategy {
    name: "exact_postal_code",
    run: exact_postal_code,
};

pub const NEIGHBORHOOD: Strategy = Strategy {
    name: "neighborhood",
    run: neighborhood,
};

/// Neighborhood, locality and postal-code fragments.
pub const OTHER_FIELDS: Strategy = Strategy {
    name: "other_fields",
    run: other_fields,
};

const FREE_TEXT_CHAIN: &[Strategy] = &[FOLDED_STREET, PLAIN_STREET];
const POSTAL_CODE_CHAIN: &[Strategy] = &[EXACT_POSTAL_CODE];
const NEIGHBORHOOD_CHAIN: &[Strategy] = &[NEIGHBORHOOD];
const BROAD_CHAIN: &[Strategy] = &[FOLDED_STREET, PLAIN_STREET, OTHER_FIELDS];

pub const fn chain_for(kind: QueryKind) -> &'static [Strategy] {
    match kind {
        QueryKind::FreeText => FREE_TEXT_CHAIN,
        QueryKind::PostalCode => POSTAL_CODE_CHAIN,
        QueryKind::Neighborhood => NEIGHBORHOOD_CHAIN,
        QueryKind::Broad => BROAD_CHAIN,
    }
}

/// Run `chain` until a strategy returns something. Store errors stop the chain.
pub fn run_chain(
    store: &dyn GazetteerStore,
    query: &SearchQuery,
    chain: &[Strategy],
) -> StrategyResult {
    for strategy in chain {
        let records = (strategy.run)(store, query)?;
        if !records.is_empty() {
            debug!(
                strategy = strategy.name,
                matches = records.len(),
                "Strategy matched"
            );
            return Ok(records);
        }
        trace!(strategy = strategy.name, "Strategy found nothing");
    }
    Ok(Vec::new())
}

fn folded_street(store: &dyn GazetteerStore, query: &SearchQuery) -> StrategyResult {
    store.folded_contains(Field::StreetName, &query.folded)
}

fn plain_street(store: &dyn GazetteerStore, query: &SearchQuery) -> StrategyResult {
    store.contains(Field::StreetName, &query.raw)
}

fn exact_postal_code(store: &dyn GazetteerStore, query: &SearchQuery) -> StrategyResult {
    if query.digits.is_empty() {
        return Ok(Vec::new());
    }
    Ok(store
        .find_by_postal_code(&query.digits)?
        .into_iter()
        .collect())
}

fn neighborhood(store: &dyn GazetteerStore, query: &SearchQuery) -> StrategyResult {
    store.contains(Field::Neighborhood, &query.raw)
}

fn other_fields(store: &dyn GazetteerStore, query: &SearchQuery) -> StrategyResult {
    let mut records = store.folded_contains(Field::Neighborhood, &query.folded)?;
    records.extend(store.folded_contains(Field::Locality, &query.folded)?);
    if query.digits.len() >= MIN_POSTAL_FRAGMENT {
        records.extend(store.postal_code_contains(&query.digits)?);
    }
    let mut seen = AHashSet::with_capacity(records.len());
    records.retain(|record| seen.insert(record.id));
    Ok(records)
}
