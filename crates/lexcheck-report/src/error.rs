//! Report error types

use std::path::PathBuf;
use thiserror::Error;

/// Durable channel failures
#[derive(Error, Debug)]
pub enum ReportError {
    /// Destination could not be opened
    #[error("cannot open report {path}: {source}")]
    Open {
        /// Report destination
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Append or flush failed
    #[error("report write failed: {0}")]
    Write(#[from] std::io::Error),

    /// Entry could not be encoded
    #[error("report entry encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Entries were kept in memory but never reached the durable sink
    #[error("{count} report entries were not persisted")]
    Dropped {
        /// Number of entries lost by the sink
        count: usize,
    },
}

/// Result type for report operations
pub type Result<T> = std::result::Result<T, ReportError>;
