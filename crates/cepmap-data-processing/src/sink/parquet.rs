use std::path::{Path, PathBuf};

use ahash::AHashSet;
use polars::prelude::*;
use tracing::info;

use super::{GazetteerSink, StoredRow};
use crate::error::{DataError, Result};

const PART_PREFIX: &str = "part-";
const PART_EXTENSION: &str = "parquet";

/// Gazetteer persisted as numbered Parquet part files, one per batch.
#[derive(Debug)]
pub struct ParquetPartSink {
    dir: PathBuf,
    next_part: usize,
}

impl ParquetPartSink {
    /// Open (and create if needed) a gazetteer directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let next_part = part_files(&dir)?
            .iter()
            .filter_map(|path| part_index(path))
            .max()
            .map_or(0, |last| last + 1);
        Ok(Self { dir, next_part })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn existing_frame(&self) -> Result<Option<DataFrame>> {
        if part_files(&self.dir)?.is_empty() {
            return Ok(None);
        }
        load_gazetteer_frame(&self.dir).map(Some)
    }
}

impl GazetteerSink for ParquetPartSink {
    fn existing_postal_codes(&self) -> Result<AHashSet<String>> {
        let Some(df) = self.existing_frame()? else {
            return Ok(AHashSet::new());
        };
        Ok(df
            .column("cep")?
            .str()?
            .into_iter()
            .flatten()
            .map(ToString::to_string)
            .collect())
    }

    fn next_id(&self) -> Result<u64> {
        let Some(df) = self.existing_frame()? else {
            return Ok(1);
        };
        let max_id = df.column("id")?.cast(&DataType::UInt64)?.u64()?.max();
        Ok(max_id.unwrap_or(0) + 1)
    }

    fn write_batch(&mut self, batch: &[StoredRow]) -> Result<()> {
        let mut df = batch_frame(batch)?;
        let path = self
            .dir
            .join(format!("{PART_PREFIX}{:05}.{PART_EXTENSION}", self.next_part));
        let sink_time = std::time::Instant::now();
        let mut file = std::fs::File::create(&path)?;
        ParquetWriter::new(&mut file).finish(&mut df)?;
        self.next_part += 1;
        info!(
            path = ?path.file_name(),
            rows = batch.len(),
            sink_time = ?sink_time.elapsed(),
            "Saved batch to parquet file"
        );
        Ok(())
    }
}

fn batch_frame(batch: &[StoredRow]) -> Result<DataFrame> {
    let rows = batch.iter().map(|stored| &stored.row);
    Ok(df!(
        "id" => batch.iter().map(|stored| stored.id).collect::<Vec<u64>>(),
        "logradouro" => rows.clone().map(|r| r.logradouro.as_str()).collect::<Vec<_>>(),
        "cep" => rows.clone().map(|r| r.cep.as_str()).collect::<Vec<_>>(),
        "bairro" => rows.clone().map(|r| r.bairro.as_deref()).collect::<Vec<_>>(),
        "localidade" => rows.clone().map(|r| r.localidade.as_str()).collect::<Vec<_>>(),
        "uf" => rows.clone().map(|r| r.uf.as_str()).collect::<Vec<_>>(),
        "latitude" => rows.clone().map(|r| r.latitude).collect::<Vec<_>>(),
        "longitude" => rows.clone().map(|r| r.longitude).collect::<Vec<_>>(),
        "tipo_numeracao" => rows.clone().map(|r| r.tipo_numeracao.as_deref()).collect::<Vec<_>>(),
        "situacao" => rows.clone().map(|r| r.situacao.as_deref()).collect::<Vec<_>>(),
        "tipo_codificacao" => rows.map(|r| r.tipo_codificacao.as_deref()).collect::<Vec<_>>(),
    )?)
}

fn part_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut parts = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == PART_EXTENSION)
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(PART_PREFIX))
        })
        .collect::<Vec<_>>();
    parts.sort();
    Ok(parts)
}

/// Number of a part file, `part-00042.parquet` -> 42.
fn part_index(path: &Path) -> Option<usize> {
    path.file_stem()?
        .to_str()?
        .strip_prefix(PART_PREFIX)?
        .parse()
        .ok()
}

/// Load every part file of a gazetteer directory into one frame, in part order.
pub fn load_gazetteer_frame(dir: &Path) -> Result<DataFrame> {
    let parts = part_files(dir)?;
    if parts.is_empty() {
        return Err(DataError::GazetteerNotFound(dir.to_path_buf()));
    }
    let t_load = std::time::Instant::now();
    let mut frames = parts
        .iter()
        .map(|path| Ok(LazyFrame::scan_parquet(path, Default::default())?.collect()?))
        .collect::<Result<Vec<DataFrame>>>()?
        .into_iter();
    let mut df = frames
        .next()
        .ok_or_else(|| DataError::GazetteerNotFound(dir.to_path_buf()))?;
    for frame in frames {
        df.vstack_mut(&frame)?;
    }
    info!(
        parts = parts.len(),
        rows = df.height(),
        time_collected = ?t_load.elapsed(),
        "Loaded gazetteer into memory"
    );
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IngestConfig, ingest, raw::AddressRow};
    use rstest::rstest;

    fn rows() -> Vec<AddressRow> {
        vec![
            AddressRow::new("77600-000", "Rua das Flores", "Paraíso do Tocantins", "TO")
                .with_bairro("Centro")
                .with_coordinates(-10.1722, -48.881),
            AddressRow::new("77600-010", "Avenida Flórida", "Paraíso do Tocantins", "TO"),
            AddressRow::new("77600-020", "Rua Tiradentes", "Paraíso do Tocantins", "TO"),
        ]
    }

    #[test]
    fn test_parquet_sink_writes_one_part_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ParquetPartSink::new(dir.path()).unwrap();
        let config = IngestConfig::default().batch_size(2);
        let report = ingest(rows(), &mut sink, &config).unwrap();

        assert_eq!(report.batches, 2);
        assert_eq!(part_files(dir.path()).unwrap().len(), 2);

        let df = load_gazetteer_frame(dir.path()).unwrap();
        assert_eq!(df.height(), 3);
        let ceps: Vec<Option<&str>> = df.column("cep").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(
            ceps,
            vec![Some("77600-000"), Some("77600-010"), Some("77600-020")]
        );
    }

    #[test]
    fn test_parquet_sink_rerun_appends_only_new_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ParquetPartSink::new(dir.path()).unwrap();
        ingest(rows(), &mut sink, &IngestConfig::default()).unwrap();

        let mut reopened = ParquetPartSink::new(dir.path()).unwrap();
        assert_eq!(reopened.next_id().unwrap(), 4);

        let mut more = rows();
        more.push(AddressRow::new(
            "77600-030",
            "Rua Álvares Cabral",
            "Paraíso do Tocantins",
            "TO",
        ));
        let report = ingest(more, &mut reopened, &IngestConfig::default()).unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.already_present, 3);

        let df = load_gazetteer_frame(dir.path()).unwrap();
        assert_eq!(df.height(), 4);
        let ids: Vec<Option<u64>> = df.column("id").unwrap().u64().unwrap().into_iter().collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn test_parquet_sink_continues_after_highest_part() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ParquetPartSink::new(dir.path()).unwrap();
        ingest(rows(), &mut sink, &IngestConfig::default().batch_size(1)).unwrap();
        std::fs::remove_file(dir.path().join("part-00001.parquet")).unwrap();

        let mut reopened = ParquetPartSink::new(dir.path()).unwrap();
        let extra = vec![AddressRow::new(
            "77600-030",
            "Rua Álvares Cabral",
            "Paraíso do Tocantins",
            "TO",
        )];
        let report = ingest(extra, &mut reopened, &IngestConfig::default()).unwrap();
        assert_eq!(report.written, 1);

        let names: Vec<_> = part_files(dir.path())
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["part-00000.parquet", "part-00002.parquet", "part-00003.parquet"]
        );

        let df = load_gazetteer_frame(dir.path()).unwrap();
        let ceps: Vec<Option<&str>> = df.column("cep").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(
            ceps,
            vec![Some("77600-000"), Some("77600-020"), Some("77600-030")]
        );
    }

    #[rstest]
    #[case("part-00000.parquet", Some(0))]
    #[case("part-00042.parquet", Some(42))]
    #[case("part-x.parquet", None)]
    #[case("other-00001.parquet", None)]
    fn test_part_index(#[case] name: &str, #[case] expected: Option<usize>) {
        assert_eq!(part_index(Path::new(name)), expected);
    }

    #[test]
    fn test_load_missing_gazetteer_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_gazetteer_frame(dir.path()).unwrap_err();
        assert!(matches!(err, DataError::GazetteerNotFound(_)));
    }
}
