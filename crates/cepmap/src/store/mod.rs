//! Read-only access to the gazetteer.
//!
//! The search engine only needs three primitives: exact postal-code lookup,
//! case-insensitive substring search on the raw text, and substring search on
//! precomputed folded keys. Anything that can answer those can back the
//! engine; [`MemoryGazetteer`] is the in-process implementation.
use std::sync::Arc;

pub use error::StoreError;
use error::Result;
pub use memory::MemoryGazetteer;

use crate::model::AddressRecord;

mod memory;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum StoreError {
        #[error("Data processing error: {0}")]
        Data(#[from] cepmap_data_processing::DataError),
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] polars::prelude::PolarsError),
        #[error("Store unavailable: {0}")]
        Unavailable(String),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, StoreError>;
}

/// Searchable text fields of an [`AddressRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    StreetName,
    Neighborhood,
    Locality,
}

/// Query primitives every gazetteer backend provides.
///
/// Results come back in storage order; ranking is the caller's job. An empty
/// needle matches nothing.
pub trait GazetteerStore: Send + Sync {
    /// Exact lookup by the digits of the postal code.
    fn find_by_postal_code(&self, digits: &str) -> Result<Option<AddressRecord>>;

    /// Case-insensitive substring match on the raw field text.
    fn contains(&self, field: Field, needle: &str) -> Result<Vec<AddressRecord>>;

    /// Substring match of an already normalized needle on the normalized field.
    fn folded_contains(&self, field: Field, folded_needle: &str) -> Result<Vec<AddressRecord>>;

    /// Records whose postal-code digits contain `digits`.
    fn postal_code_contains(&self, digits: &str) -> Result<Vec<AddressRecord>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: GazetteerStore + ?Sized> GazetteerStore for Arc<S> {
    fn find_by_postal_code(&self, digits: &str) -> Result<Option<AddressRecord>> {
        (**self).find_by_postal_code(digits)
    }

    fn contains(&self, field: Field, needle: &str) -> Result<Vec<AddressRecord>> {
        (**self).contains(field, needle)
    }

    fn folded_contains(&self, field: Field, folded_needle: &str) -> Result<Vec<AddressRecord>> {
        (**self).folded_contains(field, folded_needle)
    }

    fn postal_code_contains(&self, digits: &str) -> Result<Vec<AddressRecord>> {
        (**self).postal_code_contains(digits)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}
