use std::path::Path;

use ahash::AHashMap;
use cepmap_data_processing::{AddressRow, StoredRow, gazetteer_dir, load_gazetteer_frame};
use itertools::izip;
use polars::prelude::{DataFrame, DataType};
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use super::{Field, GazetteerStore, error::Result};
use crate::{model::AddressRecord, normalize};

const FRAME_COLUMNS: [&str; 11] = [
    "id",
    "logradouro",
    "cep",
    "bairro",
    "localidade",
    "uf",
    "latitude",
    "longitude",
    "tipo_numeracao",
    "situacao",
    "tipo_codificacao",
];

/// Lower-cased and folded variants of one record's searchable text.
#[derive(Debug, Clone)]
struct RecordKeys {
    street_lower: String,
    street_folded: String,
    neighborhood_lower: Option<String>,
    neighborhood_folded: Option<String>,
    locality_lower: String,
    locality_folded: String,
    postal_digits: String,
}

impl RecordKeys {
    fn new(record: &AddressRecord) -> Self {
        Self {
            street_lower: record.street_name.to_lowercase(),
            street_folded: normalize::normalize(&record.street_name),
            neighborhood_lower: record.neighborhood.as_deref().map(str::to_lowercase),
            neighborhood_folded: record.neighborhood.as_deref().map(normalize::normalize),
            locality_lower: record.locality.to_lowercase(),
            locality_folded: normalize::normalize(&record.locality),
            postal_digits: normalize::digits_only(&record.postal_code),
        }
    }

    fn lower(&self, field: Field) -> Option<&str> {
        match field {
            Field::StreetName => Some(&self.street_lower),
            Field::Neighborhood => self.neighborhood_lower.as_deref(),
            Field::Locality => Some(&self.locality_lower),
        }
    }

    fn folded(&self, field: Field) -> Option<&str> {
        match field {
            Field::StreetName => Some(&self.street_folded),
            Field::Neighborhood => self.neighborhood_folded.as_deref(),
            Field::Locality => Some(&self.locality_folded),
        }
    }
}

/// Whole gazetteer held in memory with precomputed comparison keys.
///
/// Read-only after construction, so it can be shared across threads and
/// tasks behind an `Arc` without locking.
#[derive(Debug, Clone, Default)]
pub struct MemoryGazetteer {
    records: Vec<AddressRecord>,
    keys: Vec<RecordKeys>,
    by_postal_code: AHashMap<String, usize>,
}

impl MemoryGazetteer {
    pub fn new(records: Vec<AddressRecord>) -> Self {
        let keys: Vec<RecordKeys> = records.par_iter().map(RecordKeys::new).collect();
        let mut by_postal_code = AHashMap::with_capacity(records.len());
        for (idx, key) in keys.iter().enumerate() {
            if key.postal_digits.is_empty() {
                continue;
            }
            by_postal_code
                .entry(key.postal_digits.clone())
                .or_insert(idx);
        }
        if by_postal_code.len() < records.len() {
            warn!(
                records = records.len(),
                unique_postal_codes = by_postal_code.len(),
                "Gazetteer contains repeated or empty postal codes"
            );
        }
        Self {
            records,
            keys,
            by_postal_code,
        }
    }

    /// Build from validated rows, numbering them from 1 in input order.
    pub fn from_rows(rows: Vec<AddressRow>) -> Self {
        Self::from_stored(
            rows.into_iter()
                .zip(1..)
                .map(|(row, id)| StoredRow { id, row })
                .collect(),
        )
    }

    pub fn from_stored(rows: Vec<StoredRow>) -> Self {
        Self::new(rows.into_iter().map(AddressRecord::from).collect())
    }

    /// Build from a frame with the persisted gazetteer columns.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let cols = df.select(FRAME_COLUMNS)?.take_columns();
        let ids = cols[0].cast(&DataType::UInt64)?;
        let latitudes = cols[6].cast(&DataType::Float64)?;
        let longitudes = cols[7].cast(&DataType::Float64)?;

        let mut skipped = 0usize;
        let records = izip!(
            ids.u64()?,
            cols[1].str()?,
            cols[2].str()?,
            cols[3].str()?,
            cols[4].str()?,
            cols[5].str()?,
        )
        .zip(izip!(latitudes.f64()?, longitudes.f64()?))
        .zip(izip!(cols[8].str()?, cols[9].str()?, cols[10].str()?))
        .filter_map(
            |(
                ((id, street_name, postal_code, neighborhood, locality, state_code), (latitude, longitude)),
                (numbering_kind, status, coding_kind),
            )| {
                let (Some(id), Some(postal_code)) = (id, postal_code) else {
                    skipped += 1;
                    return None;
                };
                Some(AddressRecord {
                    id,
                    street_name: street_name.unwrap_or_default().to_string(),
                    neighborhood: neighborhood.map(ToString::to_string),
                    locality: locality.unwrap_or_default().to_string(),
                    state_code: state_code.unwrap_or_default().to_string(),
                    postal_code: postal_code.to_string(),
                    latitude,
                    longitude,
                    numbering_kind: numbering_kind.map(ToString::to_string),
                    status: status.map(ToString::to_string),
                    coding_kind: coding_kind.map(ToString::to_string),
                })
            },
        )
        .collect::<Vec<_>>();

        if skipped > 0 {
            warn!(skipped, "Skipped gazetteer rows without id or postal code");
        }
        Ok(Self::new(records))
    }

    /// Load the persisted gazetteer from a directory of Parquet part files.
    #[instrument(name = "Load gazetteer", level = "info")]
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let df = load_gazetteer_frame(dir)?;
        let store = Self::from_frame(&df)?;
        info!(records = store.len(), "Gazetteer ready");
        Ok(store)
    }

    /// Load from the default data directory (`DATA_DIR`).
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&gazetteer_dir())
    }

    pub fn records(&self) -> &[AddressRecord] {
        &self.records
    }

    fn collect_where(&self, pred: impl Fn(&RecordKeys) -> bool + Sync) -> Vec<AddressRecord> {
        self.keys
            .par_iter()
            .zip(self.records.par_iter())
            .filter(|(keys, _)| pred(keys))
            .map(|(_, record)| record.clone())
            .collect()
    }
}

impl GazetteerStore for MemoryGazetteer {
    fn find_by_postal_code(&self, digits: &str) -> Result<Option<AddressRecord>> {
        if digits.is_empty() {
            return Ok(None);
        }
        Ok(self
            .by_postal_code
            .get(digits)
            .map(|&idx| self.records[idx].clone()))
    }

    fn contains(&self, field: Field, needle: &str) -> Result<Vec<AddressRecord>> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.collect_where(|keys| keys.lower(field).is_some_and(|v| v.contains(&needle))))
    }

    fn folded_contains(&self, field: Field, folded_needle: &str) -> Result<Vec<AddressRecord>> {
        if folded_needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.collect_where(|keys| {
            keys.folded(field)
                .is_some_and(|v| v.contains(folded_needle))
        }))
    }

    fn postal_code_contains(&self, digits: &str) -> Result<Vec<AddressRecord>> {
        if digits.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.collect_where(|keys| keys.postal_digits.contains(digits)))
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
