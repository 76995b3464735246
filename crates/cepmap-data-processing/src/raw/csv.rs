use std::path::Path;

use polars::prelude::*;

use super::RawAddressRow;
use crate::error::{DataError, Result};

/// Columns read from the sheet export. Only `cep` is required.
const COLUMNS: [&str; 10] = [
    "cep",
    "logradouro",
    "bairro",
    "localidade",
    "uf",
    "tipo_numeracao",
    "situacao",
    "tipo_codificacao",
    "latitude",
    "longitude",
];

/// Read a CSV export as untyped text rows.
///
/// Schema inference is disabled so postal codes keep their leading zeros.
pub fn read_csv_rows(path: &Path, separator: u8) -> Result<Vec<RawAddressRow>> {
    let df = LazyCsvReader::new(path)
        .with_separator(separator)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    if df.column("cep").is_err() {
        return Err(DataError::MissingColumn {
            column: "cep".to_string(),
            path: path.to_path_buf(),
        });
    }

    let mut columns = COLUMNS
        .iter()
        .map(|name| text_column(&df, name))
        .collect::<Result<Vec<_>>>()?
        .into_iter();
    let mut next = || columns.next().unwrap_or_default();
    let (cep, logradouro, bairro, localidade, uf) = (next(), next(), next(), next(), next());
    let (tipo_numeracao, situacao, tipo_codificacao, latitude, longitude) =
        (next(), next(), next(), next(), next());

    Ok((0..df.height())
        .map(|i| RawAddressRow {
            cep: cep[i].clone(),
            logradouro: logradouro[i].clone(),
            bairro: bairro[i].clone(),
            localidade: localidade[i].clone(),
            uf: uf[i].clone(),
            tipo_numeracao: tipo_numeracao[i].clone(),
            situacao: situacao[i].clone(),
            tipo_codificacao: tipo_codificacao[i].clone(),
            latitude: latitude[i].clone(),
            longitude: longitude[i].clone(),
        })
        .collect())
}

/// Column values as owned strings. Absent columns read as all-null.
fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };
    let column = column.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|value| value.map(ToString::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_csv_keeps_leading_zeros_and_missing_columns() {
        let file = csv_file("cep,logradouro,localidade,uf\n01310100,Avenida Paulista,São Paulo,SP\n");
        let rows = read_csv_rows(file.path(), b',').unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cep.as_deref(), Some("01310100"));
        assert_eq!(rows[0].logradouro.as_deref(), Some("Avenida Paulista"));
        assert_eq!(rows[0].bairro, None);
        assert_eq!(rows[0].latitude, None);
    }

    #[test]
    fn test_read_csv_with_semicolon_separator() {
        let file = csv_file(
            "cep;logradouro;bairro;localidade;uf\n77600-000;Rua das Flores;Centro;Paraíso do Tocantins;TO\n",
        );
        let rows = read_csv_rows(file.path(), b';').unwrap();
        assert_eq!(rows[0].bairro.as_deref(), Some("Centro"));
        assert_eq!(rows[0].localidade.as_deref(), Some("Paraíso do Tocantins"));
    }

    #[test]
    fn test_read_csv_without_cep_column_fails() {
        let file = csv_file("logradouro,uf\nRua A,TO\n");
        let err = read_csv_rows(file.path(), b',').unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { .. }));
    }
}
