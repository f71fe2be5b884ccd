use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_warn};
use harvester_core::Cursor;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CursorStoreError {
    #[error("cursor slot unreachable: {0}")]
    Unreachable(String),
    #[error("cursor slot {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },
    #[error("cursor directory {path} is not usable: {message}")]
    Directory { path: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// One overwrite-only continuation slot per query key.
#[async_trait::async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self, query_key: &str) -> Result<Option<Cursor>, CursorStoreError>;

    /// Overwrite the slot; `None` clears it.
    async fn store(&self, query_key: &str, cursor: Option<&Cursor>) -> Result<(), CursorStoreError>;
}

#[async_trait::async_trait]
impl<T: CursorStore + ?Sized> CursorStore for Box<T> {
    async fn load(&self, query_key: &str) -> Result<Option<Cursor>, CursorStoreError> {
        (**self).load(query_key).await
    }

    async fn store(&self, query_key: &str, cursor: Option<&Cursor>) -> Result<(), CursorStoreError> {
        (**self).store(query_key, cursor).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedCursor {
    query_key: String,
    /// Empty means "start fresh".
    token: String,
    updated_utc: String,
}

/// Cursor slots as small RON files under one directory.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    dir: PathBuf,
}

impl FileCursorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slot_path(&self, query_key: &str) -> PathBuf {
        self.dir.join(slot_filename(query_key))
    }

    /// Create the slot directory if needed and check that it takes new files.
    pub fn prepare_dir(&self) -> Result<(), CursorStoreError> {
        let unusable = |message: String| CursorStoreError::Directory {
            path: self.dir.display().to_string(),
            message,
        };
        match fs::metadata(&self.dir) {
            Ok(meta) if !meta.is_dir() => return Err(unusable("not a directory".to_string())),
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&self.dir).map_err(|e| unusable(e.to_string()))?;
            }
            Err(err) => return Err(unusable(err.to_string())),
        }
        NamedTempFile::new_in(&self.dir).map_err(|e| unusable(e.to_string()))?;
        Ok(())
    }

    /// Readers see either the previous slot or the new one, never a mix.
    fn replace_slot(&self, query_key: &str, content: &str) -> Result<PathBuf, CursorStoreError> {
        self.prepare_dir()?;
        let target = self.slot_path(query_key);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|err| CursorStoreError::Io(err.error))?;
        Ok(target)
    }

    fn load_blocking(&self, query_key: &str) -> Result<Option<Cursor>, CursorStoreError> {
        let path = self.slot_path(query_key);
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(CursorStoreError::Unreachable(format!("{}: {err}", path.display())))
            }
        };

        let persisted: PersistedCursor =
            ron::from_str(&content).map_err(|err| CursorStoreError::Corrupt {
                path: path.display().to_string(),
                message: err.to_string(),
            })?;
        if persisted.query_key != query_key {
            engine_warn!(
                "Cursor slot {:?} belongs to {:?}, ignoring it",
                path,
                persisted.query_key
            );
            return Ok(None);
        }
        Ok(Cursor::parse(&persisted.token))
    }

    fn store_blocking(&self, query_key: &str, cursor: Option<&Cursor>) -> Result<(), CursorStoreError> {
        let persisted = PersistedCursor {
            query_key: query_key.to_string(),
            token: cursor.map(|c| c.as_str().to_string()).unwrap_or_default(),
            updated_utc: chrono::Utc::now().to_rfc3339(),
        };
        let content = ron::ser::to_string_pretty(&persisted, ron::ser::PrettyConfig::new())
            .map_err(|err| CursorStoreError::Corrupt {
                path: self.slot_path(query_key).display().to_string(),
                message: err.to_string(),
            })?;
        let path = self.replace_slot(query_key, &content)?;
        engine_debug!("Stored cursor {:?} at {:?}", persisted.token, path);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self, query_key: &str) -> Result<Option<Cursor>, CursorStoreError> {
        let store = self.clone();
        let query_key = query_key.to_string();
        tokio::task::spawn_blocking(move || store.load_blocking(&query_key))
            .await
            .map_err(|err| CursorStoreError::Unreachable(err.to_string()))?
    }

    async fn store(&self, query_key: &str, cursor: Option<&Cursor>) -> Result<(), CursorStoreError> {
        let store = self.clone();
        let query_key = query_key.to_string();
        let cursor = cursor.cloned();
        tokio::task::spawn_blocking(move || store.store_blocking(&query_key, cursor.as_ref()))
            .await
            .map_err(|err| CursorStoreError::Unreachable(err.to_string()))?
    }
}

/// `cursor--{short_hash(key)}.ron`; stable for a key, safe on every filesystem.
pub fn slot_filename(query_key: &str) -> String {
    let digest = Sha256::digest(query_key.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    format!("cursor--{hex}.ron")
}
