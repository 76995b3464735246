//! Transport-agnostic handlers for the public endpoints.
//!
//! - `GET search?q=` : [`SearchService::get_search`]
//! - `POST search` with `{name}`, `{cep}` or `{bairro}` : [`SearchService::post_search`]
//! - `GET geocode?address=` : [`SearchService::geocode`]
//!
//! Request and response types are serde structs with the wire field names, so
//! any HTTP framework can mount these handlers directly. Errors carry the
//! status code to answer with ([`ServiceError::status_code`]).
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

pub use error::ServiceError;
use error::Result;

use crate::{
    map::{ForwardGeocoder, MapError, PlaceMatch, google::GoogleGeocoder},
    model::AddressRecord,
    search::{QueryKind, RankedPage, SearchEngine, SearchError},
    store::GazetteerStore,
};

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum ServiceError {
        #[error("{0}")]
        Validation(String),
        #[error("Search failed: {0}")]
        Search(#[from] crate::search::SearchError),
        #[error("Could not find the address")]
        AddressNotFound,
        #[error("Map features are disabled")]
        MapDisabled,
        #[error("Map provider error: {0}")]
        Map(#[from] crate::map::MapError),
    }
    pub type Result<T> = std::result::Result<T, ServiceError>;
}

impl ServiceError {
    /// HTTP status to answer with.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::AddressNotFound => 400,
            Self::Search(_) => 500,
            Self::Map(_) => 502,
            Self::MapDisabled => 503,
        }
    }

    pub const fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            message: self.to_string(),
        }
    }
}

/// JSON error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetSearchResponse {
    pub results: Vec<AddressRecord>,
    pub total: usize,
    pub showing: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<RankedPage> for GetSearchResponse {
    fn from(page: RankedPage) -> Self {
        Self {
            results: page.records,
            total: page.total,
            showing: page.shown,
            message: None,
        }
    }
}

impl From<GetSearchResponse> for RankedPage {
    fn from(response: GetSearchResponse) -> Self {
        Self {
            records: response.results,
            total: response.total,
            shown: response.showing,
        }
    }
}

/// Body of `POST search`. Blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cep: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bairro: Option<String>,
}

impl PostSearchRequest {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn cep(cep: impl Into<String>) -> Self {
        Self {
            cep: Some(cep.into()),
            ..Self::default()
        }
    }

    pub fn bairro(bairro: impl Into<String>) -> Self {
        Self {
            bairro: Some(bairro.into()),
            ..Self::default()
        }
    }

    /// The key that will be served, by precedence `name`, `cep`, `bairro`.
    pub fn selected(&self) -> Option<(QueryKind, &str)> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|value| !value.is_empty())
        }
        present(self.name.as_deref())
            .map(|v| (QueryKind::FreeText, v))
            .or_else(|| present(self.cep.as_deref()).map(|v| (QueryKind::PostalCode, v)))
            .or_else(|| present(self.bairro.as_deref()).map(|v| (QueryKind::Neighborhood, v)))
    }
}

/// `{}` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyObject {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostSearchResponse {
    /// `name` and `bairro` lookups.
    Records(Vec<AddressRecord>),
    /// `cep` lookup hit.
    Record(Box<AddressRecord>),
    /// `cep` lookup miss.
    Empty(EmptyObject),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeParams {
    pub address: Option<String>,
}

pub type GeocodeResponse = PlaceMatch;

/// Endpoint handlers over a [`SearchEngine`] and an optional forward geocoder.
#[derive(Debug)]
pub struct SearchService<S, G = GoogleGeocoder> {
    engine: SearchEngine<S>,
    geocoder: Option<G>,
}

impl<S: GazetteerStore> SearchService<S> {
    /// Service without geocoding; the geocode endpoint answers `MapDisabled`.
    pub const fn new(engine: SearchEngine<S>) -> Self {
        Self {
            engine,
            geocoder: None,
        }
    }
}

impl<S: GazetteerStore, G: ForwardGeocoder> SearchService<S, G> {
    pub const fn with_geocoder(engine: SearchEngine<S>, geocoder: Option<G>) -> Self {
        Self { engine, geocoder }
    }

    pub const fn engine(&self) -> &SearchEngine<S> {
        &self.engine
    }

    fn invalid(message: impl Into<String>) -> ServiceError {
        let message = message.into();
        debug!(%message, "Rejected request");
        ServiceError::Validation(message)
    }

    fn search_failed(err: SearchError) -> ServiceError {
        error!(error = %err, "Search failed");
        ServiceError::Search(err)
    }

    /// `GET search?q=`: broad search, up to the top-level page size.
    #[instrument(name = "GET search", skip(self), level = "info")]
    pub fn get_search(&self, params: &GetSearchParams) -> Result<GetSearchResponse> {
        let query = params
            .q
            .as_deref()
            .ok_or_else(|| Self::invalid("Missing query parameter 'q'"))?;

        if !self.engine.is_searchable(query) {
            return Ok(GetSearchResponse {
                results: Vec::new(),
                total: 0,
                showing: 0,
                message: Some(format!(
                    "Query must have at least {} characters",
                    self.engine.config().min_query_len
                )),
            });
        }

        let page = self
            .engine
            .search(query, QueryKind::Broad)
            .map_err(Self::search_failed)?;
        Ok(page.into())
    }

    /// `POST search`: one of `name`, `cep` or `bairro`.
    #[instrument(name = "POST search", skip(self), level = "info")]
    pub fn post_search(&self, request: &PostSearchRequest) -> Result<PostSearchResponse> {
        let (kind, value) = request
            .selected()
            .ok_or_else(|| Self::invalid("Provide one of 'name', 'cep' or 'bairro'"))?;

        let page = self
            .engine
            .search(value, kind)
            .map_err(Self::search_failed)?;

        Ok(match kind {
            QueryKind::PostalCode => page.records.into_iter().next().map_or(
                PostSearchResponse::Empty(EmptyObject {}),
                |record| PostSearchResponse::Record(Box::new(record)),
            ),
            QueryKind::FreeText | QueryKind::Neighborhood | QueryKind::Broad => {
                PostSearchResponse::Records(page.records)
            }
        })
    }

    /// `GET geocode?address=`: forward geocoding through the map provider.
    #[instrument(name = "GET geocode", skip(self), level = "info")]
    pub async fn geocode(&self, params: &GeocodeParams) -> Result<GeocodeResponse> {
        let address = params
            .address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .ok_or_else(|| Self::invalid("Missing query parameter 'address'"))?;
        let geocoder = self.geocoder.as_ref().ok_or(ServiceError::MapDisabled)?;

        match geocoder.geocode_address(address).await {
            Ok(Some(place)) => Ok(place),
            Ok(None) | Err(MapError::Provider { .. }) => Err(ServiceError::AddressNotFound),
            Err(err) => {
                error!(error = %err, "Geocoding failed");
                Err(ServiceError::Map(err))
            }
        }
    }
}
