use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;
pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Gazetteer not found in {0}")]
    GazetteerNotFound(PathBuf),
    #[error("Missing required column '{column}' in {path}")]
    MissingColumn { column: String, path: PathBuf },
    #[error("Source file not found: {0}")]
    SourceNotFound(PathBuf),
}
