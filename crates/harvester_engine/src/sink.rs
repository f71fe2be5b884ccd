use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::engine_info;
use harvester_core::{name_key, BusinessRecord, COLUMNS};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unreachable: {0}")]
    Unreachable(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Append-only record destination and the source of prior history.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    /// Names of every stored record.
    async fn read_keys(&self) -> Result<HashSet<String>, SinkError>;

    /// Append records in the given order, as one batch.
    async fn append(&self, records: &[BusinessRecord]) -> Result<(), SinkError>;
}

#[async_trait::async_trait]
impl<T: Sink + ?Sized> Sink for Box<T> {
    async fn read_keys(&self) -> Result<HashSet<String>, SinkError> {
        (**self).read_keys().await
    }

    async fn append(&self, records: &[BusinessRecord]) -> Result<(), SinkError> {
        (**self).append(records).await
    }
}

/// CSV file with a header row in [`COLUMNS`] order. A missing file is an
/// empty history; it is created with its header on first append.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored record, in file order.
    pub fn read_records(&self) -> Result<Vec<BusinessRecord>, SinkError> {
        let Some(mut reader) = self.open_reader()? else {
            return Ok(Vec::new());
        };
        let mut records = Vec::new();
        for row in reader.records() {
            if let Some(record) = BusinessRecord::from_row(&row?.iter().collect::<Vec<_>>()) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn open_reader(&self) -> Result<Option<csv::Reader<File>>, SinkError> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(
                csv::ReaderBuilder::new()
                    .has_headers(true)
                    .flexible(true)
                    .from_reader(file),
            )),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SinkError::Unreachable(format!("{}: {err}", self.path.display()))),
        }
    }

    fn read_keys_blocking(&self) -> Result<HashSet<String>, SinkError> {
        let Some(mut reader) = self.open_reader()? else {
            return Ok(HashSet::new());
        };
        let mut keys = HashSet::new();
        for row in reader.records() {
            let row = row?;
            if let Some(key) = row.get(0).and_then(name_key) {
                keys.insert(key);
            }
        }
        Ok(keys)
    }

    fn append_blocking(&self, records: &[BusinessRecord]) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| SinkError::Unreachable(format!("{}: {err}", parent.display())))?;
        }
        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| SinkError::Unreachable(format!("{}: {err}", self.path.display())))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(COLUMNS)?;
        }
        for record in records {
            writer.write_record(record.to_row())?;
        }
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|err| SinkError::Io(err.into_error()))?;
        file.sync_all()?;

        engine_info!("Appended {} rows to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[async_trait::async_trait]
impl Sink for CsvSink {
    async fn read_keys(&self) -> Result<HashSet<String>, SinkError> {
        let sink = self.clone();
        tokio::task::spawn_blocking(move || sink.read_keys_blocking())
            .await
            .map_err(|err| SinkError::Unreachable(err.to_string()))?
    }

    async fn append(&self, records: &[BusinessRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        let sink = self.clone();
        let records = records.to_vec();
        tokio::task::spawn_blocking(move || sink.append_blocking(&records))
            .await
            .map_err(|err| SinkError::Unreachable(err.to_string()))?
    }
}
