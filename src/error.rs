use std::path::PathBuf;

use thiserror::Error;

/// Rejected run parameters. Raised before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("validation error: {0}")]
    Validation(#[from] ConfigError),
    #[error("input file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("malformed input {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
    #[error("column '{column}' not found in {}", path.display())]
    ColumnNotFound { column: String, path: PathBuf },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl JoinError {
    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        JoinError::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = JoinError> = std::result::Result<T, E>;
