use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::engine_info;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::ArticleRecord;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cache directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("cache file {path:?} is not a valid article list: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("serializing articles failed: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Flat JSON list of article records, written atomically.
#[derive(Debug, Clone)]
pub struct ArticleCache {
    path: PathBuf,
}

impl ArticleCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Cached records, or `None` when no cache file exists yet.
    pub fn load(&self) -> Result<Option<Vec<ArticleRecord>>, PersistError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let records: Vec<ArticleRecord> =
            serde_json::from_str(&content).map_err(|source| PersistError::Format {
                path: self.path.clone(),
                source,
            })?;
        engine_info!("Loaded {} cached articles from {:?}", records.len(), self.path);
        Ok(Some(records))
    }

    pub fn save(&self, records: &[ArticleRecord]) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(records).map_err(PersistError::Serialize)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_dir(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PersistError::Io(e.error))?;

        engine_info!("Saved {} articles to {:?}", records.len(), self.path);
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))
}
