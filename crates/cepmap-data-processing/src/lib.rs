//! Gazetteer ingestion for `cepmap`.
//!
//! Reads raw address rows (CSV exports of the postal-code sheet, or the JSON
//! array format), canonicalises postal codes, keeps the first row seen for each
//! postal code and persists the result in fixed-size batches. The persisted
//! gazetteer is a directory of numbered Parquet part files which the search
//! crate loads into memory.
//!
//! ```rust
//! use cepmap_data_processing::{IngestConfig, MemorySink, ingest, raw::AddressRow};
//!
//! let rows = vec![
//!     AddressRow::new("77600-000", "Rua das Flores", "Paraíso do Tocantins", "TO"),
//!     AddressRow::new("77600-000", "Rua Duplicada", "Paraíso do Tocantins", "TO"),
//! ];
//! let mut sink = MemorySink::default();
//! let report = ingest(rows, &mut sink, &IngestConfig::default())?;
//! assert_eq!(report.written, 1);
//! assert_eq!(report.duplicates, 1);
//! # Ok::<(), cepmap_data_processing::DataError>(())
//! ```
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub mod dedup;
pub mod raw;
pub mod sink;
pub mod test_data;

mod error;

pub use dedup::{DedupStats, PostalCodeDedup, dedup_by_postal_code};
pub use error::{DataError, Result};
pub use raw::{AddressRow, RawAddressRow, SourceFormat, canonical_postal_code};
pub use sink::{
    GazetteerSink, MemorySink, ParquetPartSink, StoredRow, load_gazetteer_frame, persist_in_batches,
};

pub const DATA_DIR_DEFAULT: &str = "./cepmap_data";
pub const GAZETTEER_SUBDIR: &str = "gazetteer";
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Global data directory.
///
/// `DATA_DIR` wins when set. With the `system-dirs` feature the platform data
/// directory is used next, and `./cepmap_data` otherwise.
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(dir) = std::env::var("DATA_DIR") {
        return PathBuf::from(dir);
    }
    #[cfg(feature = "system-dirs")]
    if let Some(dirs) = directories::ProjectDirs::from("br", "cepmap", "cepmap") {
        return dirs.data_dir().to_path_buf();
    }
    PathBuf::from(DATA_DIR_DEFAULT)
});

pub fn get_data_dir() -> &'static Path {
    DATA_DIR.as_path()
}

/// Directory holding the persisted gazetteer part files.
pub fn gazetteer_dir() -> PathBuf {
    get_data_dir().join(GAZETTEER_SUBDIR)
}

/// Settings for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Rows per persisted batch. Bounds the size of each write.
    pub batch_size: usize,
    /// Field separator for CSV sources.
    pub csv_separator: u8,
    /// Draw a progress bar while persisting.
    pub show_progress: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            csv_separator: b',',
            show_progress: false,
        }
    }
}

impl IngestConfig {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn csv_separator(mut self, separator: u8) -> Self {
        self.csv_separator = separator;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IngestReport {
    /// Rows accepted from the source (after dropping rows without a postal code).
    pub read: usize,
    pub skipped_missing_postal_code: usize,
    /// Later rows repeating a postal code already seen in this run.
    pub duplicates: usize,
    /// Rows whose postal code was already persisted by an earlier run.
    pub already_present: usize,
    pub written: usize,
    pub batches: usize,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Deduplicate `rows` and persist them into `sink`.
///
/// Postal codes already present in the sink are filtered out first, so running
/// the same input twice writes nothing the second time.
#[instrument(name = "Ingest gazetteer rows", skip_all, level = "info")]
pub fn ingest<S: GazetteerSink>(
    rows: Vec<AddressRow>,
    sink: &mut S,
    config: &IngestConfig,
) -> Result<IngestReport> {
    let read = rows.len();
    let existing = sink.existing_postal_codes()?;
    info!(
        read,
        existing = existing.len(),
        batch_size = config.batch_size,
        "Starting ingestion"
    );

    let mut dedup = PostalCodeDedup::with_existing(rows, existing);
    let batches = persist_in_batches(&mut dedup, sink, config)?;
    let stats = dedup.stats();

    let report = IngestReport {
        read,
        skipped_missing_postal_code: 0,
        duplicates: stats.duplicates,
        already_present: stats.already_present,
        written: stats.kept,
        batches,
        generated_at: chrono::Utc::now(),
    };
    info!(
        written = report.written,
        duplicates = report.duplicates,
        already_present = report.already_present,
        batches = report.batches,
        "Ingestion complete"
    );
    Ok(report)
}

/// Read a source file and ingest it.
#[instrument(name = "Ingest gazetteer file", skip(sink, config), level = "info")]
pub fn ingest_file<S: GazetteerSink>(
    path: &Path,
    sink: &mut S,
    config: &IngestConfig,
) -> Result<IngestReport> {
    let format = SourceFormat::from_path(path, config.csv_separator);
    let (rows, skipped) = raw::read_rows(path, format)?;
    let mut report = ingest(rows, sink, config)?;
    report.skipped_missing_postal_code = skipped;
    Ok(report)
}
