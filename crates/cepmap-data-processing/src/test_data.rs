use std::io::Write;

use tempfile::NamedTempFile;
use tracing::info;

use super::error::Result;
use super::raw::AddressRow;

const LOCALITY: &str = "Paraíso do Tocantins";
const STATE: &str = "TO";

/// Small gazetteer of Paraíso do Tocantins streets used across the test suites.
///
/// Includes accented names, a row without coordinates and several streets
/// sharing the `77600` prefix.
pub fn sample_rows() -> Vec<AddressRow> {
    vec![
        AddressRow::new("77600-000", "Rua das Flores", LOCALITY, STATE)
            .with_bairro("Centro")
            .with_coordinates(-10.1722, -48.8810),
        AddressRow::new("77600-010", "Avenida Flórida", LOCALITY, STATE)
            .with_bairro("Setor Oeste")
            .with_coordinates(-10.1701, -48.8852),
        AddressRow::new("77600-020", "Rua Álvares Cabral", LOCALITY, STATE)
            .with_bairro("Centro")
            .with_coordinates(-10.1745, -48.8791),
        AddressRow::new("77600-030", "Avenida Transbrasiliana", LOCALITY, STATE)
            .with_bairro("Jardim Paulista"),
        AddressRow::new("77600-040", "Rua Tiradentes", LOCALITY, STATE)
            .with_bairro("Setor Aeroporto")
            .with_coordinates(-10.1689, -48.8901),
        AddressRow::new("77600-050", "Rua Ótica Central", LOCALITY, STATE)
            .with_bairro("Centro")
            .with_coordinates(-10.1730, -48.8822),
        AddressRow::new("77605-000", "Rua Florianópolis", LOCALITY, STATE)
            .with_bairro("Setor Pouso Alegre")
            .with_coordinates(-10.1811, -48.8755),
    ]
}

/// Write rows as a comma separated export with the sheet's column names.
pub fn write_rows_csv(rows: &[AddressRow]) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
    writeln!(file, "cep,logradouro,bairro,localidade,uf,latitude,longitude")?;
    for row in rows {
        writeln!(
            file,
            "{},{},{},{},{},{},{}",
            row.cep,
            row.logradouro,
            row.bairro.as_deref().unwrap_or_default(),
            row.localidade,
            row.uf,
            row.latitude.map(|v| v.to_string()).unwrap_or_default(),
            row.longitude.map(|v| v.to_string()).unwrap_or_default(),
        )?;
    }
    file.flush()?;
    info!(rows = rows.len(), path = ?file.path(), "Created test CSV");
    Ok(file)
}

/// `sample_rows` plus a duplicate postal code and a row without one.
pub fn sample_csv_with_noise() -> Result<NamedTempFile> {
    let mut rows = sample_rows();
    rows.push(AddressRow::new("77600-000", "Rua Duplicada", LOCALITY, STATE));
    let file = write_rows_csv(&rows)?;
    let mut handle = file.reopen()?;
    std::io::Seek::seek(&mut handle, std::io::SeekFrom::End(0))?;
    writeln!(handle, ",Rua Sem CEP,,{LOCALITY},{STATE},,")?;
    Ok(file)
}
