use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{IngestConfig, error::Result, raw::AddressRow};

mod parquet;

pub use parquet::{ParquetPartSink, load_gazetteer_frame};

/// A persisted row with its stable identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: u64,
    #[serde(flatten)]
    pub row: AddressRow,
}

/// Destination of an ingestion run.
pub trait GazetteerSink {
    /// Postal codes already persisted.
    fn existing_postal_codes(&self) -> Result<AHashSet<String>>;
    /// First id available for new rows (existing maximum + 1).
    fn next_id(&self) -> Result<u64>;
    fn write_batch(&mut self, batch: &[StoredRow]) -> Result<()>;
}

/// Sink keeping everything in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Vec<StoredRow>,
    batch_sizes: Vec<usize>,
}

impl MemorySink {
    pub fn rows(&self) -> &[StoredRow] {
        &self.rows
    }

    pub fn batch_sizes(&self) -> &[usize] {
        &self.batch_sizes
    }

    pub fn into_rows(self) -> Vec<StoredRow> {
        self.rows
    }
}

impl GazetteerSink for MemorySink {
    fn existing_postal_codes(&self) -> Result<AHashSet<String>> {
        Ok(self.rows.iter().map(|stored| stored.row.cep.clone()).collect())
    }

    fn next_id(&self) -> Result<u64> {
        Ok(self.rows.iter().map(|stored| stored.id).max().unwrap_or(0) + 1)
    }

    fn write_batch(&mut self, batch: &[StoredRow]) -> Result<()> {
        self.batch_sizes.push(batch.len());
        self.rows.extend_from_slice(batch);
        Ok(())
    }
}

/// Assign ids and write `rows` to `sink` in chunks of `config.batch_size`.
///
/// Returns the number of batches written.
pub fn persist_in_batches<I, S>(rows: &mut I, sink: &mut S, config: &IngestConfig) -> Result<usize>
where
    I: Iterator<Item = AddressRow>,
    S: GazetteerSink + ?Sized,
{
    let batch_size = config.batch_size.max(1);
    let mut next_id = sink.next_id()?;
    let mut batches = 0;
    let progress = progress_bar(config.show_progress);

    loop {
        let batch: Vec<StoredRow> = rows
            .by_ref()
            .take(batch_size)
            .map(|row| {
                let stored = StoredRow { id: next_id, row };
                next_id += 1;
                stored
            })
            .collect();
        if batch.is_empty() {
            break;
        }
        sink.write_batch(&batch)?;
        batches += 1;
        debug!(batch = batches, rows = batch.len(), "Persisted batch");
        progress.inc(batch.len() as u64);
    }

    progress.finish();
    info!(batches, next_id, "Persisted all batches");
    Ok(batches)
}

#[cfg(feature = "progress")]
struct Progress(Option<indicatif::ProgressBar>);

#[cfg(feature = "progress")]
impl Progress {
    fn inc(&self, delta: u64) {
        if let Some(pb) = &self.0 {
            pb.inc(delta);
        }
    }

    fn finish(&self) {
        if let Some(pb) = &self.0 {
            pb.finish_and_clear();
        }
    }
}

#[cfg(feature = "progress")]
fn progress_bar(enabled: bool) -> Progress {
    use indicatif::{ProgressBar, ProgressStyle};

    Progress(enabled.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} rows persisted ({per_sec})")
                .expect("Progress bar template"),
        );
        pb.set_message("Persisting gazetteer");
        pb
    }))
}

#[cfg(not(feature = "progress"))]
struct Progress;

#[cfg(not(feature = "progress"))]
impl Progress {
    const fn inc(&self, _delta: u64) {}
    const fn finish(&self) {}
}

#[cfg(not(feature = "progress"))]
const fn progress_bar(_enabled: bool) -> Progress {
    Progress
}
