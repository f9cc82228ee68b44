//! Error types for lexcheck core
//!
//! Row-level problems never surface here: they are recovered locally and
//! land in the report. What remains is:
//! - dataset-level failures (unreadable file, missing columns, unwritable output)
//! - run-level failures (configuration, report destination)
//! - explicit cancellation

use lexcheck_report::ReportError;
use std::path::PathBuf;

/// Main lexcheck error type
#[derive(Debug, thiserror::Error)]
pub enum LexcheckError {
    /// Dataset cannot be read or written
    #[error("dataset {path}: {message}")]
    DatasetIo {
        /// Dataset path
        path: PathBuf,
        /// Detail
        message: String,
    },

    /// Dataset header lacks required columns
    #[error("dataset {path} is missing required columns: {}", columns.join(", "))]
    MissingColumns {
        /// Dataset path
        path: PathBuf,
        /// Missing column names
        columns: Vec<String>,
    },

    /// A verification task died before reporting
    #[error("dataset {dataset}: verification task failed: {message}")]
    VerificationTask {
        /// Dataset name
        dataset: String,
        /// Join failure detail
        message: String,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Durable report failed
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// Rollback log cannot be opened or appended to
    #[error("rollback log {path}: {message}")]
    RollbackLog {
        /// Log path
        path: PathBuf,
        /// Detail
        message: String,
    },

    /// Run was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl LexcheckError {
    /// Create dataset I/O error
    #[inline]
    pub fn dataset_io(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::DatasetIo {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Check if error aborts only the dataset it occurred in
    #[inline]
    #[must_use]
    pub fn is_dataset_local(&self) -> bool {
        matches!(
            self,
            Self::DatasetIo { .. } | Self::MissingColumns { .. } | Self::VerificationTask { .. }
        )
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read {path}: {source}")]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// Environment override has the wrong type
    #[error("environment variable {name}: {message}")]
    Env {
        /// Variable name
        name: &'static str,
        /// Detail
        message: String,
    },

    /// Value out of range
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Offending setting
        field: &'static str,
        /// Detail
        message: String,
    },
}

/// Result type for lexcheck core operations
pub type Result<T> = std::result::Result<T, LexcheckError>;
