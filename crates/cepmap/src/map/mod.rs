//! Map synchronization.
//!
//! Turns records and map clicks into [`Location`]s and keeps the drawn markers
//! consistent with the current results and selection. Provider specifics stay
//! behind the [`MapProvider`] capability trait.
use std::{
    collections::BTreeMap,
    future::Future,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

pub use error::MapError;
use error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{
    client::SearchState,
    config::MapConfig,
    model::{AddressRecord, LatLng, Location},
};

pub mod google;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum MapError {
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Map provider returned {status}: {message}")]
        Provider { status: String, message: String },
        #[error("Marker error: {0}")]
        Marker(String),
    }
    pub type Result<T> = std::result::Result<T, MapError>;
}

/// Address parts resolved by the provider for a point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressComponents {
    pub street: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

/// Reverse geocoding result for a clicked point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub position: LatLng,
    pub components: AddressComponents,
    pub formatted_address: Option<String>,
}

/// Forward geocoding match for a free-form address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceMatch {
    pub formatted_address: String,
    pub location: LatLng,
    pub place_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkerStyle {
    #[default]
    Default,
    Selected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub position: LatLng,
    pub title: String,
    pub style: MarkerStyle,
    pub record_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerHandle(pub u64);

/// Camera position for the map view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
}

/// What the core needs from a map provider.
pub trait MapProvider: Send + Sync {
    /// Reverse geocode a point.
    fn geocode(&self, point: LatLng) -> impl Future<Output = Result<GeocodeResult>> + Send;
    fn add_marker(&self, spec: MarkerSpec) -> Result<MarkerHandle>;
    fn remove_marker(&self, handle: MarkerHandle) -> Result<()>;
}

/// Address lookup used by the geocode endpoint.
pub trait ForwardGeocoder: Send + Sync {
    /// `None` when the provider knows no such address.
    fn geocode_address(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<PlaceMatch>>> + Send;
}

/// Registry of drawn markers. Providers that render elsewhere (a browser, a
/// tile renderer) keep their marker bookkeeping here.
#[derive(Debug, Default)]
pub struct MarkerLayer {
    next_handle: AtomicU64,
    markers: Mutex<BTreeMap<MarkerHandle, MarkerSpec>>,
}

impl MarkerLayer {
    pub fn add(&self, spec: MarkerSpec) -> MarkerHandle {
        let handle = MarkerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, spec);
        handle
    }

    pub fn remove(&self, handle: MarkerHandle) -> Result<()> {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| MapError::Marker(format!("unknown marker {}", handle.0)))
    }

    /// Markers currently drawn, in creation order.
    pub fn markers(&self) -> Vec<MarkerSpec> {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Location for a selected record. `None` when the record has no coordinates.
pub fn on_select(record: &AddressRecord) -> Option<Location> {
    let position = record.position()?;
    Some(Location {
        lat: position.lat,
        lng: position.lng,
        street: Some(record.street_name.clone()),
        neighborhood: record.neighborhood.clone(),
        city: Some(record.locality.clone()),
        postal_code: Some(record.postal_code.clone()),
        full_address: Some(full_address(record)),
    })
}

/// Location for a clicked point, from the provider's address components only.
pub fn on_map_click(geocode: GeocodeResult) -> Location {
    Location {
        lat: geocode.position.lat,
        lng: geocode.position.lng,
        street: geocode.components.street,
        neighborhood: geocode.components.neighborhood,
        city: geocode.components.city,
        postal_code: geocode.components.postal_code,
        full_address: geocode.formatted_address,
    }
}

fn full_address(record: &AddressRecord) -> String {
    let mut parts = vec![record.street_name.as_str()];
    if let Some(neighborhood) = record.neighborhood.as_deref() {
        parts.push(neighborhood);
    }
    format!(
        "{} - {}/{}, {}",
        parts.join(", "),
        record.locality,
        record.state_code,
        record.postal_code
    )
}

/// Keeps a provider's markers in step with the search state.
#[derive(Debug)]
pub struct MapSync<P> {
    provider: P,
    config: MapConfig,
    drawn: Mutex<Vec<MarkerHandle>>,
}

impl<P: MapProvider> MapSync<P> {
    pub fn new(provider: P, config: MapConfig) -> Self {
        Self {
            provider,
            config,
            drawn: Mutex::new(Vec::new()),
        }
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    pub const fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Remove every drawn marker, then draw one per record with coordinates.
    ///
    /// Returns the number of markers drawn. Handles the provider failed to
    /// remove stay tracked and are retried on the next refresh.
    #[instrument(name = "Refresh markers", skip_all, fields(records = records.len()), level = "debug")]
    pub fn refresh_markers(
        &self,
        records: &[AddressRecord],
        selected: Option<&AddressRecord>,
    ) -> Result<usize> {
        let mut drawn = self.drawn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut first_err = None;
        for handle in std::mem::take(&mut *drawn) {
            if let Err(err) = self.provider.remove_marker(handle) {
                warn!(handle = handle.0, error = %err, "Failed to remove marker");
                drawn.push(handle);
                first_err.get_or_insert(err);
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        let selected_id = selected.map(|record| record.id);
        for record in records {
            let Some(position) = record.position() else {
                debug!(id = record.id, street = %record.street_name, "Record has no coordinates, no marker");
                continue;
            };
            let style = if selected_id == Some(record.id) {
                MarkerStyle::Selected
            } else {
                MarkerStyle::Default
            };
            drawn.push(self.provider.add_marker(MarkerSpec {
                position,
                title: record.street_name.clone(),
                style,
                record_id: record.id,
            })?);
        }
        Ok(drawn.len())
    }

    /// Redraw markers for `state` and return the camera to use.
    pub fn sync(&self, state: &SearchState) -> Result<Viewport> {
        self.refresh_markers(&state.results, state.selected.as_ref())?;
        let focus = state.selected.as_ref().and_then(on_select);
        Ok(self.viewport(focus.as_ref()))
    }

    /// Default view, or a close-up on `focus`.
    pub const fn viewport(&self, focus: Option<&Location>) -> Viewport {
        match focus {
            Some(location) => Viewport {
                center: location.position(),
                zoom: self.config.focus_zoom,
            },
            None => Viewport {
                center: self.config.center,
                zoom: self.config.zoom,
            },
        }
    }

    /// Resolve a clicked point into a [`Location`].
    #[instrument(name = "Map click", skip(self), level = "info")]
    pub async fn click(&self, point: LatLng) -> Result<Location> {
        let geocode = self.provider.geocode(point).await?;
        Ok(on_map_click(geocode))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::store::MemoryGazetteer;
    use cepmap_data_processing::test_data::sample_rows;

    /// Provider double answering every click with a fixed street.
    #[derive(Debug, Default)]
    struct FakeProvider {
        layer: MarkerLayer,
        street: Option<String>,
        /// The next this-many removals fail and leave the marker drawn.
        failing_removals: AtomicUsize,
    }

    impl MapProvider for FakeProvider {
        async fn geocode(&self, point: LatLng) -> Result<GeocodeResult> {
            Ok(GeocodeResult {
                position: point,
                components: AddressComponents {
                    street: self.street.clone(),
                    neighborhood: Some("Centro".into()),
                    city: Some("Paraíso do Tocantins".into()),
                    postal_code: Some("77600-000".into()),
                },
                formatted_address: self
                    .street
                    .as_ref()
                    .map(|street| format!("{street}, Paraíso do Tocantins - TO")),
            })
        }

        fn add_marker(&self, spec: MarkerSpec) -> Result<MarkerHandle> {
            Ok(self.layer.add(spec))
        }

        fn remove_marker(&self, handle: MarkerHandle) -> Result<()> {
            let failing = self
                .failing_removals
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
            if failing.is_ok() {
                return Err(MapError::Marker(format!("marker {} is busy", handle.0)));
            }
            self.layer.remove(handle)
        }
    }

    fn records() -> Vec<AddressRecord> {
        MemoryGazetteer::from_rows(sample_rows()).records().to_vec()
    }

    #[test]
    fn test_on_select_requires_coordinates() {
        let records = records();
        let with_coords = on_select(&records[0]).unwrap();
        assert_eq!(with_coords.street.as_deref(), Some("Rua das Flores"));
        assert_eq!(with_coords.lat, -10.1722);
        assert_eq!(
            with_coords.full_address.as_deref(),
            Some("Rua das Flores, Centro - Paraíso do Tocantins/TO, 77600-000")
        );

        let without = records
            .iter()
            .find(|r| r.street_name == "Avenida Transbrasiliana")
            .unwrap();
        assert!(on_select(without).is_none());
    }

    #[test]
    fn test_on_map_click_maps_components() {
        let location = on_map_click(GeocodeResult {
            position: LatLng {
                lat: -10.17,
                lng: -48.88,
            },
            components: AddressComponents {
                street: Some("Rua Tiradentes".into()),
                ..Default::default()
            },
            formatted_address: None,
        });
        assert_eq!(location.street.as_deref(), Some("Rua Tiradentes"));
        assert_eq!(location.lng, -48.88);
        assert!(location.city.is_none());
    }

    #[test]
    fn test_refresh_replaces_all_markers_and_skips_missing_coordinates() {
        let sync = MapSync::new(FakeProvider::default(), MapConfig::default());
        let records = records();

        let drawn = sync.refresh_markers(&records, Some(&records[1])).unwrap();
        assert_eq!(drawn, records.len() - 1);
        let markers = sync.provider().layer.markers();
        assert_eq!(markers.len(), drawn);
        let selected: Vec<_> = markers
            .iter()
            .filter(|m| m.style == MarkerStyle::Selected)
            .collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].record_id, records[1].id);

        let drawn = sync.refresh_markers(&records[..1], None).unwrap();
        assert_eq!(drawn, 1);
        let markers = sync.provider().layer.markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].style, MarkerStyle::Default);
    }

    #[test]
    fn test_failed_removal_is_retried_on_next_refresh() {
        let sync = MapSync::new(FakeProvider::default(), MapConfig::default());
        let records = records();
        let drawn = sync.refresh_markers(&records, None).unwrap();
        assert_eq!(drawn, records.len() - 1);

        sync.provider().failing_removals.store(1, Ordering::Relaxed);
        let err = sync.refresh_markers(&records[1..2], None).unwrap_err();
        assert!(matches!(err, MapError::Marker(_)));
        // Only the marker that could not be removed is left
        let markers = sync.provider().layer.markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].record_id, records[0].id);

        let drawn = sync.refresh_markers(&records[1..2], None).unwrap();
        assert_eq!(drawn, 1);
        let markers = sync.provider().layer.markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].record_id, records[1].id);
    }

    #[test]
    fn test_sync_focuses_selected_record() {
        let sync = MapSync::new(FakeProvider::default(), MapConfig::default());
        let records = records();
        let state = SearchState {
            results: records.clone(),
            selected: Some(records[2].clone()),
            ..Default::default()
        };
        let viewport = sync.sync(&state).unwrap();
        assert_eq!(viewport.zoom, 17);
        assert_eq!(viewport.center, records[2].position().unwrap());

        let viewport = sync.sync(&SearchState::default()).unwrap();
        assert_eq!(viewport.zoom, 15);
        assert!(sync.provider().layer.is_empty());
    }

    #[tokio::test]
    async fn test_click_resolves_location() {
        let provider = FakeProvider {
            street: Some("Rua Tiradentes".into()),
            ..Default::default()
        };
        let sync = MapSync::new(provider, MapConfig::default());
        let point = LatLng {
            lat: -10.1689,
            lng: -48.8901,
        };
        let location = sync.click(point).await.unwrap();
        assert_eq!(location.position(), point);
        assert_eq!(location.street.as_deref(), Some("Rua Tiradentes"));
        assert_eq!(location.postal_code.as_deref(), Some("77600-000"));
    }
}
