use cepmap_data_processing::StoredRow;
use serde::{Deserialize, Serialize};

/// One gazetteer entry. Immutable once stored.
///
/// Serialized with the gazetteer's Portuguese column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: u64,
    #[serde(rename = "logradouro")]
    pub street_name: String,
    #[serde(rename = "bairro", default)]
    pub neighborhood: Option<String>,
    #[serde(rename = "localidade")]
    pub locality: String,
    #[serde(rename = "uf")]
    pub state_code: String,
    /// Unique key, canonical `NNNNN-NNN`.
    #[serde(rename = "cep")]
    pub postal_code: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(
        rename = "tipo_numeracao",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub numbering_kind: Option<String>,
    #[serde(rename = "situacao", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(
        rename = "tipo_codificacao",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub coding_kind: Option<String>,
}

impl AddressRecord {
    /// Coordinates when both latitude and longitude are known.
    pub fn position(&self) -> Option<LatLng> {
        Some(LatLng {
            lat: self.latitude?,
            lng: self.longitude?,
        })
    }
}

impl From<StoredRow> for AddressRecord {
    fn from(stored: StoredRow) -> Self {
        let row = stored.row;
        Self {
            id: stored.id,
            street_name: row.logradouro,
            neighborhood: row.bairro,
            locality: row.localidade,
            state_code: row.uf,
            postal_code: row.cep,
            latitude: row.latitude,
            longitude: row.longitude,
            numbering_kind: row.tipo_numeracao,
            status: row.situacao,
            coding_kind: row.tipo_codificacao,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A resolved point on the map, with whatever address parts are known.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub street: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub full_address: Option<String>,
}

impl Location {
    pub const fn position(&self) -> LatLng {
        LatLng {
            lat: self.lat,
            lng: self.lng,
        }
    }
}
