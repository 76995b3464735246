//! Google Maps adapter backed by the Geocoding web API.
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{
    AddressComponents, ForwardGeocoder, GeocodeResult, MapError, MapProvider, MarkerHandle,
    MarkerLayer, MarkerSpec, PlaceMatch, error::Result,
};
use crate::{config::MapConfig, model::LatLng};

const STATUS_OK: &str = "OK";
const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    results: Vec<ApiResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    address_components: Vec<ApiComponent>,
    formatted_address: Option<String>,
    geometry: Option<ApiGeometry>,
    place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiGeometry {
    location: LatLng,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiComponent {
    pub long_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl ApiComponent {
    fn has_type(&self, wanted: &[&str]) -> bool {
        self.types.iter().any(|t| wanted.contains(&t.as_str()))
    }
}

/// Map Google address components onto the parts the core understands.
///
/// `route` is the street, `sublocality`/`neighborhood` the neighborhood,
/// `administrative_area_level_2` the city (falling back to `locality`) and
/// `postal_code` the postal code. The first matching component wins.
pub fn map_components(components: &[ApiComponent]) -> AddressComponents {
    let find = |wanted: &[&str]| {
        components
            .iter()
            .find(|c| c.has_type(wanted))
            .map(|c| c.long_name.clone())
    };
    AddressComponents {
        street: find(&["route"]),
        neighborhood: find(&["sublocality", "sublocality_level_1", "neighborhood"]),
        city: find(&["administrative_area_level_2"]).or_else(|| find(&["locality"])),
        postal_code: find(&["postal_code"]),
    }
}

/// Client for the Geocoding web API.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    /// `None` when the map is disabled.
    pub fn from_config(config: &MapConfig) -> Option<Self> {
        let key = config.api_key.as_deref()?;
        Some(Self::new(key, config.geocode_endpoint.as_str()))
    }

    async fn call(&self, params: &[(&str, &str)]) -> Result<ApiResponse> {
        let mut query = params.to_vec();
        query.push(("key", self.api_key.as_str()));
        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json::<ApiResponse>()
            .await?;
        debug!(status = %response.status, results = response.results.len(), "Geocoding response");
        Ok(response)
    }

    fn provider_error(response: ApiResponse) -> MapError {
        let error = MapError::Provider {
            message: response
                .error_message
                .unwrap_or_else(|| "no error message".to_string()),
            status: response.status,
        };
        warn!(%error, "Geocoding request rejected");
        error
    }

    /// Address components for a point. Unknown points yield empty components.
    #[instrument(name = "Reverse geocode", skip(self), level = "debug")]
    pub async fn reverse(&self, point: LatLng) -> Result<GeocodeResult> {
        let latlng = format!("{},{}", point.lat, point.lng);
        let response = self.call(&[("latlng", latlng.as_str())]).await?;
        match response.status.clone().as_str() {
            STATUS_OK => {
                let first = response.results.into_iter().next();
                Ok(GeocodeResult {
                    position: point,
                    components: first
                        .as_ref()
                        .map(|r| map_components(&r.address_components))
                        .unwrap_or_default(),
                    formatted_address: first.and_then(|r| r.formatted_address),
                })
            }
            STATUS_ZERO_RESULTS => Ok(GeocodeResult {
                position: point,
                ..Default::default()
            }),
            _ => Err(Self::provider_error(response)),
        }
    }

    /// Best match for a free-form address.
    #[instrument(name = "Forward geocode", skip(self), level = "debug")]
    pub async fn forward(&self, address: &str) -> Result<Option<PlaceMatch>> {
        let response = self.call(&[("address", address)]).await?;
        match response.status.clone().as_str() {
            STATUS_OK => Ok(response.results.into_iter().find_map(|r| {
                Some(PlaceMatch {
                    location: r.geometry?.location,
                    formatted_address: r.formatted_address.unwrap_or_default(),
                    place_id: r.place_id.unwrap_or_default(),
                })
            })),
            STATUS_ZERO_RESULTS => Ok(None),
            _ => Err(Self::provider_error(response)),
        }
    }
}

impl ForwardGeocoder for GoogleGeocoder {
    async fn geocode_address(&self, address: &str) -> Result<Option<PlaceMatch>> {
        self.forward(address).await
    }
}

/// Google-backed [`MapProvider`]. Markers are rendered by the map widget; the
/// layer tracks what it should show.
#[derive(Debug)]
pub struct GoogleMapsProvider {
    geocoder: GoogleGeocoder,
    layer: MarkerLayer,
}

impl GoogleMapsProvider {
    pub fn new(geocoder: GoogleGeocoder) -> Self {
        Self {
            geocoder,
            layer: MarkerLayer::default(),
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &MapConfig) -> Option<Self> {
        GoogleGeocoder::from_config(config).map(Self::new)
    }

    pub const fn layer(&self) -> &MarkerLayer {
        &self.layer
    }

    pub const fn geocoder(&self) -> &GoogleGeocoder {
        &self.geocoder
    }
}

impl MapProvider for GoogleMapsProvider {
    async fn geocode(&self, point: LatLng) -> Result<GeocodeResult> {
        self.geocoder.reverse(point).await
    }

    fn add_marker(&self, spec: MarkerSpec) -> Result<MarkerHandle> {
        Ok(self.layer.add(spec))
    }

    fn remove_marker(&self, handle: MarkerHandle) -> Result<()> {
        self.layer.remove(handle)
    }
}
