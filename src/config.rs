//! Pipeline configuration passed explicitly to the loader, profiler and registry.
//! Layering: built-in defaults, then an optional JSON file, then `NORP_PROCESSED_DIR`,
//! then command-line overrides applied by the caller.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::profiler::ColumnHeuristics;
use crate::data::registry::DEFAULT_REGISTRY_FILE;
use crate::error::{IngestError, Result};

pub const DEFAULT_PROCESSED_DIR: &str = "data/processed";
pub const PROCESSED_DIR_ENV: &str = "NORP_PROCESSED_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the catalog and the per-dataset profile documents.
    pub processed_dir: PathBuf,
    pub registry_file: String,
    pub heuristics: ColumnHeuristics,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            processed_dir: PathBuf::from(DEFAULT_PROCESSED_DIR),
            registry_file: DEFAULT_REGISTRY_FILE.to_string(),
            heuristics: ColumnHeuristics::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_processed_dir(processed_dir: impl Into<PathBuf>) -> Self {
        PipelineConfig {
            processed_dir: processed_dir.into(),
            ..PipelineConfig::default()
        }
    }

    /// Read a JSON config file. Fields left out keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| IngestError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|err| IngestError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    /// Defaults, or `config_file` when given, with the environment override applied.
    pub fn resolve(config_file: Option<&Path>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(dir) = std::env::var_os(PROCESSED_DIR_ENV).filter(|dir| !dir.is_empty()) {
            config.processed_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.processed_dir.join(&self.registry_file)
    }

    pub fn profile_path(&self, dataset_name: &str) -> PathBuf {
        self.processed_dir.join(Self::profile_file_name(dataset_name))
    }

    pub fn profile_file_name(dataset_name: &str) -> String {
        format!("{dataset_name}_profile.json")
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn default_paths_follow_processed_dir() {
        let config = PipelineConfig::with_processed_dir("/out");
        assert_eq!(config.registry_path(), PathBuf::from("/out/registry.json"));
        assert_eq!(
            config.profile_path("irs_990_2020"),
            PathBuf::from("/out/irs_990_2020_profile.json")
        );
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("norp.json");
        fs::write(
            &path,
            r#"{"processed_dir": "out", "heuristics": {"time_keywords": ["quarter"], "geo_keywords": []}}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.processed_dir, PathBuf::from("out"));
        assert_eq!(config.registry_file, DEFAULT_REGISTRY_FILE);
        assert_eq!(config.heuristics.time_keywords, vec!["quarter"]);
    }

    #[test]
    fn unreadable_config_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("norp.json");
        fs::write(&path, "[1, 2").unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap_err().kind(), "config");
        assert_eq!(
            PipelineConfig::from_file(&dir.path().join("missing.json"))
                .unwrap_err()
                .kind(),
            "config"
        );
    }
}
