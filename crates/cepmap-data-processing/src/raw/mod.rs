use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use super::error::{DataError, Result};

pub mod csv;
pub mod json;

/// Postal codes written as `NNNNN-NNN`, `NNNNNNNN` or `NN.NNN-NNN`.
static POSTAL_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2})\.?(\d{3})-?(\d{3})$").expect("Postal code pattern is valid")
});

/// Canonical `NNNNN-NNN` form of a postal code.
///
/// Returns `None` for blank input. Seven-digit numeric values (spreadsheets
/// drop the leading zero) are left-padded. Anything that does not look like a
/// postal code is kept trimmed but otherwise untouched.
pub fn canonical_postal_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(caps) = POSTAL_CODE_PATTERN.captures(trimmed) {
        return Some(format!("{}{}-{}", &caps[1], &caps[2], &caps[3]));
    }
    if trimmed.len() == 7 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!("0{}-{}", &trimmed[..4], &trimmed[4..]));
    }
    Some(trimmed.to_string())
}

/// Accept both JSON strings and numbers, since exported sheets mix the two.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.replace(',', ".").parse().ok())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A row as it appears in the source file, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawAddressRow {
    #[serde(default, deserialize_with = "string_or_number")]
    pub cep: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub logradouro: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub bairro: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub localidade: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub uf: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub tipo_numeracao: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub situacao: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub tipo_codificacao: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub latitude: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub longitude: Option<String>,
}

impl RawAddressRow {
    /// Validate the row. Rows without a postal code yield `None`.
    pub fn into_row(self) -> Option<AddressRow> {
        let cep = canonical_postal_code(self.cep.as_deref().unwrap_or_default())?;
        Some(AddressRow {
            cep,
            logradouro: non_blank(self.logradouro).unwrap_or_default(),
            bairro: non_blank(self.bairro),
            localidade: non_blank(self.localidade).unwrap_or_default(),
            uf: non_blank(self.uf).unwrap_or_default(),
            tipo_numeracao: non_blank(self.tipo_numeracao),
            situacao: non_blank(self.situacao),
            tipo_codificacao: non_blank(self.tipo_codificacao),
            latitude: parse_coordinate(self.latitude.as_deref()),
            longitude: parse_coordinate(self.longitude.as_deref()),
        })
    }
}

/// A validated gazetteer row keyed by its canonical postal code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRow {
    pub cep: String,
    pub logradouro: String,
    pub bairro: Option<String>,
    pub localidade: String,
    pub uf: String,
    pub tipo_numeracao: Option<String>,
    pub situacao: Option<String>,
    pub tipo_codificacao: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl AddressRow {
    pub fn new(cep: &str, logradouro: &str, localidade: &str, uf: &str) -> Self {
        Self {
            cep: canonical_postal_code(cep).unwrap_or_default(),
            logradouro: logradouro.to_string(),
            bairro: None,
            localidade: localidade.to_string(),
            uf: uf.to_string(),
            tipo_numeracao: None,
            situacao: None,
            tipo_codificacao: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_bairro(mut self, bairro: &str) -> Self {
        self.bairro = Some(bairro.to_string());
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

/// Source file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv { separator: u8 },
    Json,
}

impl SourceFormat {
    /// Pick the format from the file extension; anything but `.json` is CSV.
    pub fn from_path(path: &Path, separator: u8) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv { separator },
        }
    }
}

/// Read every row of `path`, dropping rows without a postal code.
///
/// Returns the validated rows in source order and the number of rows skipped.
pub fn read_rows(path: &Path, format: SourceFormat) -> Result<(Vec<AddressRow>, usize)> {
    if !path.exists() {
        return Err(DataError::SourceNotFound(path.to_path_buf()));
    }
    let raw_rows = match format {
        SourceFormat::Csv { separator } => csv::read_csv_rows(path, separator)?,
        SourceFormat::Json => json::read_json_rows(path)?,
    };
    let (rows, skipped) = validate_rows(raw_rows);
    info!(
        path = ?path.file_name(),
        rows = rows.len(),
        skipped,
        "Read raw gazetteer rows"
    );
    Ok((rows, skipped))
}

pub fn validate_rows(raw_rows: Vec<RawAddressRow>) -> (Vec<AddressRow>, usize) {
    let mut skipped = 0;
    let rows = raw_rows
        .into_iter()
        .enumerate()
        .filter_map(|(line, raw)| {
            let street = raw.logradouro.clone();
            raw.into_row().or_else(|| {
                warn!(line, street = ?street, "Skipping row without postal code");
                skipped += 1;
                None
            })
        })
        .collect();
    (rows, skipped)
}
