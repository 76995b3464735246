use ahash::AHashSet;
use tracing::debug;

use crate::raw::AddressRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub kept: usize,
    pub duplicates: usize,
    pub already_present: usize,
}

/// Streaming first-wins deduplication by postal code.
///
/// Keys present in the destination before the run are seeded into the seen
/// set and counted separately from in-run duplicates.
pub struct PostalCodeDedup<I> {
    rows: I,
    existing: AHashSet<String>,
    seen: AHashSet<String>,
    stats: DedupStats,
}

impl<I: Iterator<Item = AddressRow>> PostalCodeDedup<I> {
    pub fn new(rows: impl IntoIterator<Item = AddressRow, IntoIter = I>) -> Self {
        Self::with_existing(rows, AHashSet::new())
    }

    pub fn with_existing(
        rows: impl IntoIterator<Item = AddressRow, IntoIter = I>,
        existing: AHashSet<String>,
    ) -> Self {
        Self {
            rows: rows.into_iter(),
            existing,
            seen: AHashSet::new(),
            stats: DedupStats::default(),
        }
    }
}

impl<I> PostalCodeDedup<I> {
    pub const fn stats(&self) -> DedupStats {
        self.stats
    }
}

impl<I: Iterator<Item = AddressRow>> Iterator for PostalCodeDedup<I> {
    type Item = AddressRow;

    fn next(&mut self) -> Option<Self::Item> {
        for row in self.rows.by_ref() {
            if self.existing.contains(&row.cep) {
                self.stats.already_present += 1;
                continue;
            }
            if !self.seen.insert(row.cep.clone()) {
                debug!(cep = %row.cep, street = %row.logradouro, "Dropping duplicate postal code");
                self.stats.duplicates += 1;
                continue;
            }
            self.stats.kept += 1;
            return Some(row);
        }
        None
    }
}

/// Collect the first row for every postal code, preserving input order.
pub fn dedup_by_postal_code(rows: Vec<AddressRow>) -> (Vec<AddressRow>, DedupStats) {
    let mut dedup = PostalCodeDedup::new(rows);
    let kept = dedup.by_ref().collect();
    (kept, dedup.stats())
}
