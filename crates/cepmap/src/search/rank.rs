use serde::{Deserialize, Serialize};

use crate::{model::AddressRecord, normalize::collation_key};

/// One page of ranked results.
///
/// `shown == min(total, page_size)` and `shown == records.len()`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RankedPage {
    pub records: Vec<AddressRecord>,
    /// Matches before truncation.
    pub total: usize,
    pub shown: usize,
}

impl RankedPage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(record: AddressRecord) -> Self {
        Self {
            records: vec![record],
            total: 1,
            shown: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Sort by street name (accent and case folded), then raw name, then id, and
/// keep the first `page_size` records.
pub fn rank(mut records: Vec<AddressRecord>, page_size: usize) -> RankedPage {
    let total = records.len();
    records.sort_by_cached_key(|r| (collation_key(&r.street_name), r.street_name.clone(), r.id));
    records.truncate(page_size);
    RankedPage {
        shown: records.len(),
        records,
        total,
    }
}
