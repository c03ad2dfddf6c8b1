//! Ingestion pipeline: load, profile, register, then write the profile document.
//! Each stage runs only if the previous one succeeded. The profile document is staged before
//! registration and the catalog is restored if it cannot be put in place, so a failed run
//! leaves the catalog and the profile directory as they were.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::data::loader::DatasetLoader;
use crate::data::profiler::{DatasetProfile, SchemaProfiler};
use crate::data::registry::{stage_document, DatasetRegistry, RegistryEntry};
use crate::error::{IngestError, Result};

/// Longest file name most filesystems accept, in bytes.
const MAX_FILE_NAME_BYTES: usize = 255;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub dataset_name: String,
    pub source_path: PathBuf,
    pub registry_path: PathBuf,
    pub profile_path: PathBuf,
    pub profile: DatasetProfile,
    pub entry: RegistryEntry,
}

/// Dataset names end up in file names, so they must be non-empty and free of path syntax.
pub fn validate_dataset_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("name is empty")
    } else if name.contains(['/', '\\']) {
        Some("name must not contain path separators")
    } else if name == "." || name == ".." {
        Some("name must not be a relative path component")
    } else if PipelineConfig::profile_file_name(name).len() > MAX_FILE_NAME_BYTES {
        Some("name is too long for a profile file name")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(IngestError::InvalidDatasetName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

pub fn ingest(config: &PipelineConfig, file_path: &Path, dataset_name: &str) -> Result<IngestReport> {
    validate_dataset_name(dataset_name)?;
    info!(dataset = dataset_name, source = %file_path.display(), "starting ingestion");

    let loader = DatasetLoader::new(file_path)?;
    info!(format = loader.format().as_str(), "detected file type");
    let table = loader.load()?;

    let profile = SchemaProfiler::new(config.heuristics.clone()).profile(&table, dataset_name);
    let profile_path = config.profile_path(dataset_name);
    let payload = serde_json::to_string_pretty(&profile)
        .map_err(|err| IngestError::io(&profile_path, err.into()))?;

    let staged = stage_document(&profile_path, payload.as_bytes())?;

    let registry = DatasetRegistry::new(config.registry_path());
    let had_catalog = registry.path().exists();
    let snapshot = registry.load()?;
    let entry = registry.register(dataset_name, loader.path(), &profile)?;

    if let Err(err) = staged.persist(&profile_path) {
        warn!(
            dataset = dataset_name,
            path = %profile_path.display(),
            "profile write failed, restoring registry"
        );
        registry.restore(had_catalog.then_some(&snapshot))?;
        return Err(IngestError::io(&profile_path, err.error));
    }
    info!(path = %profile_path.display(), "schema profile saved");

    info!(
        dataset = dataset_name,
        rows = profile.row_count,
        columns = profile.column_count,
        time_columns = ?profile.time_columns,
        geo_columns = ?profile.geo_columns,
        "ingestion complete"
    );

    Ok(IngestReport {
        dataset_name: dataset_name.to_string(),
        source_path: loader.path().to_path_buf(),
        registry_path: registry.path().to_path_buf(),
        profile_path,
        profile,
        entry,
    })
}
