//! Dataset catalog: one entry per dataset name, persisted as a single JSON document.
//! Every registration reads the whole catalog, replaces one key and rewrites the whole file,
//! so concurrent writers are last-writer-wins.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::data::profiler::DatasetProfile;
use crate::error::{IngestError, Result};

pub const DEFAULT_REGISTRY_FILE: &str = "registry.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub path: String,
    pub row_count: usize,
    pub column_count: usize,
    pub column_names: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Catalog contents keyed by dataset name.
pub type Catalog = BTreeMap<String, RegistryEntry>;

/// One row of [`DatasetRegistry::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub path: String,
    pub row_count: usize,
    pub column_count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    path: PathBuf,
}

impl DatasetRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DatasetRegistry { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the catalog. A missing document is an empty catalog; an unparsable one is an error.
    pub fn load(&self) -> Result<Catalog> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no existing registry, starting empty");
                return Ok(Catalog::new());
            }
            Err(err) => return Err(IngestError::file_read(&self.path, err)),
        };
        let catalog: Catalog =
            serde_json::from_slice(&raw).map_err(|source| IngestError::CorruptRegistry {
                path: self.path.clone(),
                source,
            })?;
        info!(datasets = catalog.len(), "loaded registry");
        Ok(catalog)
    }

    /// Replace the catalog document with `catalog`. The new content is written to a temporary
    /// file next to the catalog and renamed over it.
    pub fn save(&self, catalog: &Catalog) -> Result<()> {
        let payload = serde_json::to_string_pretty(catalog)
            .map_err(|err| IngestError::io(&self.path, err.into()))?;
        write_atomic(&self.path, payload.as_bytes())?;
        info!(path = %self.path.display(), datasets = catalog.len(), "registry saved");
        Ok(())
    }

    /// Insert or replace the entry for `name`. A previous entry is discarded entirely.
    pub fn register(
        &self,
        name: &str,
        file_path: &Path,
        profile: &DatasetProfile,
    ) -> Result<RegistryEntry> {
        let mut catalog = self.load()?;
        let entry = RegistryEntry {
            path: file_path.display().to_string(),
            row_count: profile.row_count,
            column_count: profile.column_count,
            column_names: profile.column_names(),
            timestamp: Utc::now(),
        };

        if catalog.insert(name.to_string(), entry.clone()).is_some() {
            warn!(dataset = name, "dataset already registered, overwriting");
        }
        self.save(&catalog)?;

        info!(
            dataset = name,
            rows = entry.row_count,
            columns = entry.column_count,
            "registered dataset"
        );
        Ok(entry)
    }

    /// Put the catalog back the way a [`DatasetRegistry::load`] snapshot saw it. `None` means
    /// there was no document, so any document written since is removed.
    pub fn restore(&self, snapshot: Option<&Catalog>) -> Result<()> {
        match snapshot {
            Some(catalog) => self.save(catalog),
            None => match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(IngestError::io(&self.path, err)),
            },
        }
    }

    pub fn list(&self) -> Result<Vec<DatasetSummary>> {
        let summaries = self
            .load()?
            .into_iter()
            .map(|(name, entry)| DatasetSummary {
                name,
                path: entry.path,
                row_count: entry.row_count,
                column_count: entry.column_count,
                timestamp: entry.timestamp,
            })
            .collect();
        Ok(summaries)
    }

    pub fn get(&self, name: &str) -> Result<Option<RegistryEntry>> {
        Ok(self.load()?.remove(name))
    }
}

/// Write `contents` to `path` through a sibling temporary file so readers never see a
/// half-written document. Parent directories are created as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    stage_document(path, contents)?
        .persist(path)
        .map_err(|err| IngestError::io(path, err.error))?;
    Ok(())
}

/// Write `contents` to a temporary file in the directory of `path` without replacing `path`.
/// The caller persists it; dropping it removes the temporary file.
pub fn stage_document(path: &Path, contents: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|err| IngestError::io(dir, err))?;
    let mut staged = NamedTempFile::new_in(dir).map_err(|err| IngestError::io(dir, err))?;
    staged
        .write_all(contents)
        .and_then(|()| staged.flush())
        .map_err(|err| IngestError::io(path, err))?;
    Ok(staged)
}
