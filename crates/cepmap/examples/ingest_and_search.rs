//! Ingest a CEP file and drive a search session over it
//!
//! Usage: `cargo run --example ingest_and_search -- [path/to/ceps.csv]`
//!
//! Without a path the bundled sample rows are used. Rows are deduplicated by
//! postal code and written as Parquet part files into a scratch directory,
//! then loaded back and searched through a debounced `SearchSession`.

use std::time::Duration;

use cepmap::{
    MemoryGazetteer, NavigationKey, SearchEngine, SearchSession, SessionConfig,
    client::LocalBackend,
    data_processing::{IngestConfig, ParquetPartSink, ingest, ingest_file, test_data},
};
use tracing::{Level, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cepmap::init_logging(Level::INFO)?;

    let dir = tempfile::tempdir()?;
    let mut sink = ParquetPartSink::new(dir.path())?;
    let config = IngestConfig::default().batch_size(1000);

    let report = match std::env::args().nth(1) {
        Some(path) => ingest_file(std::path::Path::new(&path), &mut sink, &config)?,
        None => ingest(test_data::sample_rows(), &mut sink, &config)?,
    };
    info!(
        written = report.written,
        duplicates = report.duplicates,
        skipped = report.skipped_missing_postal_code,
        "Gazetteer ready"
    );

    let store = MemoryGazetteer::load_from_dir(dir.path())?;
    let backend = LocalBackend::new(SearchEngine::new(store));
    let mut session = SearchSession::new(
        backend,
        SessionConfig::default().with_debounce(Duration::from_millis(200)),
    );

    // Simulated typing; only the last text is fetched
    for text in ["r", "ru", "rua", "rua t", "rua ti"] {
        session.input(text);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    session.settle().await;

    let state = session.state();
    println!("Query '{}' -> {:?}", state.query_text, state.status);
    for record in &state.results {
        println!("  {} - {}", record.street_name, record.postal_code);
    }

    if let Some(index) = session.navigate(NavigationKey::End) {
        let state = session.state();
        if let Some(selected) = state.selected {
            println!("Selected #{index}: {}", selected.street_name);
        }
    }

    Ok(())
}
