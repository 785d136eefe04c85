//! The combined dataset: one CSV file carried from run to run.
//!
//! The file has a header row with exactly the columns of
//! [`DatasetRow`](crate::models::DatasetRow), in order. It is read whole at
//! the start of a run and replaced whole at the end: rows are encoded in
//! memory, written to `<name>.tmp` next to the target, flushed to disk and
//! renamed over the old file. A failed write leaves the previous file as it
//! was.

use crate::errors::DatasetError;
use crate::models::DatasetRow;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

pub const COLUMNS: [&str; 7] = ["country", "source", "title", "date_iso", "summary", "url", "category"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedDataset {
    rows: Vec<DatasetRow>,
}

impl CombinedDataset {
    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: DatasetRow) {
        self.rows.push(row);
    }

    /// Read the dataset at `path`. A missing or empty file is an empty dataset.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, DatasetError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No dataset yet; starting empty");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(DatasetError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let malformed = |source| DatasetError::Malformed {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let header = reader.headers().map_err(malformed)?;
        if header.iter().ne(COLUMNS) {
            return Err(DatasetError::Header {
                path: path.to_path_buf(),
                found: header.iter().map(str::to_string).collect(),
                expected: COLUMNS.iter().map(|c| c.to_string()).collect(),
            });
        }
        let rows = reader
            .deserialize::<DatasetRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(malformed)?;

        info!(rows = rows.len(), "Loaded dataset");
        Ok(Self { rows })
    }

    /// Encode every row as CSV with the header.
    pub fn to_csv(&self) -> Result<Vec<u8>, DatasetError> {
        // Header written by hand so an empty dataset still has one.
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        writer.write_record(COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| DatasetError::Encode(csv::Error::from(e.into_error())))
    }

    /// Replace the file at `path` with this dataset.
    #[instrument(level = "info", skip_all, fields(path = %path.display(), rows = self.rows.len()))]
    pub async fn save_atomic(&self, path: &Path) -> Result<(), DatasetError> {
        let bytes = self.to_csv()?;
        let tmp = tmp_path(path);
        let write_err = |source| DatasetError::Write {
            path: tmp.clone(),
            source,
        };

        let mut file = fs::File::create(&tmp).await.map_err(write_err)?;
        file.write_all(&bytes).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);
        debug!(tmp = %tmp.display(), bytes = bytes.len(), "Flushed temporary dataset");

        fs::rename(&tmp, path).await.map_err(|source| DatasetError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Wrote dataset");
        Ok(())
    }
}

/// `<dir>/<name>.tmp`, in the same directory so the rename stays on one filesystem.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use chrono::NaiveDate;

    fn row(title: &str, category: Category) -> DatasetRow {
        DatasetRow {
            country: "Côte d'Ivoire".into(),
            source: "Port Autonome d'Abidjan".into(),
            title: title.into(),
            date_iso: NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(),
            summary: "Line one, with a comma\nand \"quotes\"".into(),
            url: format!("https://portabidjan.ci/{}", title.len()),
            category,
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ds = CombinedDataset::load(&dir.path().join("combined_data.csv")).await.unwrap();
        assert!(ds.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined_data.csv");
        let mut ds = CombinedDataset::default();
        ds.push(row("Terminal à conteneurs", Category::Port));
        ds.push(row("Smart city pilot", Category::SmartCity));
        ds.save_atomic(&path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("country,source,title,date_iso,summary,url,category\n"));
        assert!(text.contains(",2025-10-21,"));
        assert!(text.contains(",Smart City\n"));

        let loaded = CombinedDataset::load(&path).await.unwrap();
        assert_eq!(loaded, ds);
        assert!(!tmp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_prior_file_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined_data.csv");
        let mut first = CombinedDataset::default();
        first.push(row("Original row", Category::Rail));
        first.save_atomic(&path).await.unwrap();
        let before = std::fs::read(&path).unwrap();

        // A directory in the temp file's place makes the write fail.
        std::fs::create_dir(tmp_path(&path)).unwrap();
        let mut second = first.clone();
        second.push(row("Never persisted", Category::Energy));
        let err = second.save_atomic(&path).await.unwrap_err();
        assert!(matches!(err, DatasetError::Write { .. }));

        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(CombinedDataset::load(&path).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_stale_tmp_file_is_ignored_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined_data.csv");
        std::fs::write(tmp_path(&path), "half-written garbage").unwrap();
        assert!(CombinedDataset::load(&path).await.unwrap().is_empty());

        let mut ds = CombinedDataset::default();
        ds.push(row("Fresh row", Category::Highway));
        ds.save_atomic(&path).await.unwrap();
        assert_eq!(CombinedDataset::load(&path).await.unwrap(), ds);
    }

    #[tokio::test]
    async fn test_wrong_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined_data.csv");
        std::fs::write(&path, "title,url\nA,https://x\n").unwrap();
        let err = CombinedDataset::load(&path).await.unwrap_err();
        assert!(matches!(err, DatasetError::Header { .. }));
    }

    #[tokio::test]
    async fn test_unknown_category_is_coerced_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined_data.csv");
        std::fs::write(
            &path,
            "country,source,title,date_iso,summary,url,category\nGhana,GPHA,Tema expansion,2025-10-20,,https://x/1,NonInfra\n",
        )
        .unwrap();
        let ds = CombinedDataset::load(&path).await.unwrap();
        assert_eq!(ds.rows()[0].category, Category::Infrastructure);
    }

    #[tokio::test]
    async fn test_bad_date_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined_data.csv");
        std::fs::write(
            &path,
            "country,source,title,date_iso,summary,url,category\nGhana,GPHA,Tema,20/10/2025,,https://x/1,Port\n",
        )
        .unwrap();
        let err = CombinedDataset::load(&path).await.unwrap_err();
        assert!(matches!(err, DatasetError::Malformed { .. }));
    }

    #[test]
    fn test_tmp_path_is_sibling() {
        let p = Path::new("/data/combined_data.csv");
        assert_eq!(tmp_path(p), PathBuf::from("/data/combined_data.csv.tmp"));
    }
}
