//! cepmap - street and postal code (CEP) search over a regional gazetteer
//!
//! cepmap locates streets, neighborhoods and postal codes inside a fixed
//! gazetteer and keeps a map view consistent with whatever the user selects.
//! The engine matches queries regardless of accents and case, falls back
//! through an ordered chain of strategies and returns alphabetically ranked,
//! size-limited pages.
//!
//! # Quick Start
//!
//! ```rust
//! use cepmap::data_processing::test_data::sample_rows;
//! use cepmap::{MemoryGazetteer, QueryKind, SearchEngine};
//!
//! let store = MemoryGazetteer::from_rows(sample_rows());
//! let engine = SearchEngine::new(store);
//!
//! // Accent-insensitive street search
//! let page = engine.search("flo", QueryKind::FreeText)?;
//! assert_eq!(page.records[0].street_name, "Avenida Flórida");
//! assert!(page.shown <= page.total);
//!
//! // Postal codes match with or without punctuation
//! let page = engine.search("77600010", QueryKind::PostalCode)?;
//! assert_eq!(page.records[0].postal_code, "77600-010");
//! # Ok::<(), cepmap::error::CepMapError>(())
//! ```
//!
//! # Layers
//!
//! - [`normalize`]: comparison keys for accent and case folding
//! - [`search`]: strategy chain, ranking and the [`SearchEngine`]
//! - [`api`]: transport-agnostic handlers for the search and geocode endpoints
//! - [`client`]: the debounced, race-free client state machine and its driver
//! - [`map`]: marker lifecycle and location resolution behind [`MapProvider`]
//!
//! # Data
//!
//! The gazetteer is produced by [`data_processing`] (CSV or JSON rows,
//! deduplicated by postal code, persisted as Parquet part files) and loaded
//! into a [`MemoryGazetteer`].
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

pub mod api;
pub mod client;
mod config;
pub mod error;
pub mod map;
mod model;
pub mod normalize;
pub mod search;
pub mod store;

pub use api::SearchService;
pub use cepmap_data_processing as data_processing;
pub use client::{
    NavigationKey, SearchSession, SearchState, SearchStatus, SearchStore, SelectionController,
};
pub use config::{MapConfig, SearchConfig, SearchConfigBuilder, SessionConfig};
pub use map::{MapProvider, MapSync, MarkerStyle};
pub use model::{AddressRecord, LatLng, Location};
pub use search::{QueryKind, RankedPage, SearchEngine};
pub use store::{GazetteerStore, MemoryGazetteer};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for cepmap.
///
/// Installs a `tracing` fmt subscriber filtered at `level`; `RUST_LOG`
/// overrides the level when set. Repeated calls are no-ops.
///
/// ```rust
/// use cepmap::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), cepmap::error::CepMapError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::CepMapError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?)
            .add_directive("polars=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    })
}
