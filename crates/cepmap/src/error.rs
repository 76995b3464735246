use thiserror::Error;

#[derive(Error, Debug)]
pub enum CepMapError {
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("Search error: {0}")]
    Search(#[from] crate::search::SearchError),
    #[error("Client error: {0}")]
    Client(#[from] crate::client::ClientError),
    #[error("Map error: {0}")]
    Map(#[from] crate::map::MapError),
    #[error("Service error: {0}")]
    Service(#[from] crate::api::ServiceError),
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] cepmap_data_processing::DataError),
    #[error("DataFrame error: {0}")]
    DataFrame(#[from] polars::prelude::PolarsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CepMapError>;
