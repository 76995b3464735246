use std::{fs::File, io::BufReader, path::Path};

use super::RawAddressRow;
use crate::error::Result;

/// Read the JSON array format (`[{"cep": ..., "logradouro": ...}, ...]`).
pub fn read_json_rows(path: &Path) -> Result<Vec<RawAddressRow>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
