//! Error taxonomy shared by the loader, profiler, registry and pipeline.
//! Every variant maps to a stable `kind()` label the CLI logs on failure.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unsupported file extension '{extension}' for {}; supported extensions: {supported}", .path.display())]
    UnsupportedFormat {
        path: PathBuf,
        extension: String,
        supported: String,
    },

    #[error("data file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to read {}: {reason}", .path.display())]
    FileRead { path: PathBuf, reason: String },

    #[error("dataset {} contains no rows", .0.display())]
    EmptyDataset(PathBuf),

    #[error("registry at {} is not valid JSON: {source}", .path.display())]
    CorruptRegistry {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid dataset name '{name}': {reason}")]
    InvalidDatasetName { name: String, reason: &'static str },

    #[error("invalid config {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    pub(crate) fn file_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::FileRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable label for logs and scripts; does not change with the message text.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::FileNotFound(_) => "file_not_found",
            Self::FileRead { .. } => "file_read",
            Self::EmptyDataset(_) => "empty_dataset",
            Self::CorruptRegistry { .. } => "corrupt_registry",
            Self::InvalidDatasetName { .. } => "invalid_dataset_name",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_distinct() {
        let errors = [
            IngestError::FileNotFound(PathBuf::from("a.csv")),
            IngestError::EmptyDataset(PathBuf::from("a.csv")),
            IngestError::file_read("a.csv", "bad bytes"),
            IngestError::InvalidDatasetName {
                name: String::new(),
                reason: "name is empty",
            },
        ];
        let kinds: Vec<_> = errors.iter().map(IngestError::kind).collect();
        assert_eq!(
            kinds,
            vec!["file_not_found", "empty_dataset", "file_read", "invalid_dataset_name"]
        );
    }

    #[test]
    fn unsupported_format_message_lists_supported_extensions() {
        let err = IngestError::UnsupportedFormat {
            path: PathBuf::from("report.parquet"),
            extension: "parquet".to_string(),
            supported: "csv, json".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'parquet'"));
        assert!(msg.contains("csv, json"));
    }
}
