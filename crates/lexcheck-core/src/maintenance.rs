//! Title maintenance
//!
//! Pushes corrected titles from corrected datasets back into the index. Only
//! titles with more than one comma-delimited segment are written, so short or
//! placeholder titles are never overwritten by incomplete corrections. Every
//! overwrite is preceded by a [`RollbackEntry`] in the [`RollbackLog`] holding
//! the previous title.

use crate::cancel::CancelToken;
use crate::dataset::{dataset_name, read_title_rows};
use crate::error::{LexcheckError, Result};
use chrono::{DateTime, Utc};
use lexcheck_record::parse_id;
use lexcheck_store::IndexWriter;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Counts for one maintenance pass over one dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    /// Dataset name
    pub dataset: String,
    /// Titles overwritten (or that would be, in a dry run)
    pub updated: usize,
    /// Titles already matching the index
    pub unchanged: usize,
    /// Titles without multi-part structure
    pub skipped: usize,
    /// Identifiers absent from the index
    pub not_found: usize,
    /// Unparseable identifiers and store faults
    pub errors: usize,
}

/// Index state before one title overwrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackEntry {
    /// When the overwrite was attempted
    pub timestamp: DateTime<Utc>,
    /// Dataset the corrected title came from
    pub dataset: String,
    /// Canonical identifier
    pub id: String,
    /// Title held by the index before the write, if any
    pub previous_title: Option<String>,
    /// Title written
    pub new_title: String,
}

/// Append-only JSON Lines file of [`RollbackEntry`]
///
/// Each entry is synced to disk before the index write it describes.
#[derive(Debug)]
pub struct RollbackLog {
    path: PathBuf,
    file: File,
}

impl RollbackLog {
    /// Open `path` for appending, creating it and its directory if needed
    ///
    /// # Errors
    /// [`LexcheckError::RollbackLog`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| rollback_error(&path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| rollback_error(&path, e))?;
        Ok(Self { path, file })
    }

    /// Log file path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &RollbackEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry).map_err(|e| rollback_error(&self.path, e))?;
        line.push(b'\n');
        (&self.file)
            .write_all(&line)
            .and_then(|()| self.file.sync_data())
            .map_err(|e| rollback_error(&self.path, e))
    }
}

fn rollback_error(path: &Path, message: impl ToString) -> LexcheckError {
    LexcheckError::RollbackLog {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Check if a title has more than one non-empty comma-delimited segment
#[must_use]
pub fn is_multi_part(title: &str) -> bool {
    title.split(',').filter(|s| !s.trim().is_empty()).count() > 1
}

/// Title repair over an index writer
pub struct TitleMaintenance<'a> {
    index: &'a dyn IndexWriter,
    rollback: Option<RollbackLog>,
    dry_run: bool,
    cancel: CancelToken,
}

impl<'a> TitleMaintenance<'a> {
    /// Create maintenance pass
    #[must_use]
    pub fn new(index: &'a dyn IndexWriter) -> Self {
        Self {
            index,
            rollback: None,
            dry_run: false,
            cancel: CancelToken::new(),
        }
    }

    /// Report what would change without writing
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Record previous titles in `log` before overwriting them
    #[inline]
    #[must_use]
    pub fn with_rollback_log(mut self, log: RollbackLog) -> Self {
        self.rollback = Some(log);
        self
    }

    /// With cancel token
    #[inline]
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Repair titles from every dataset; unreadable datasets are logged and skipped
    ///
    /// # Errors
    /// [`LexcheckError::Cancelled`], or the rollback log cannot be written
    /// (no further titles are overwritten).
    pub async fn repair_titles(&self, datasets: &[PathBuf]) -> Result<Vec<RepairSummary>> {
        let mut summaries = Vec::with_capacity(datasets.len());
        for path in datasets {
            match self.repair_dataset(path).await {
                Ok(summary) => summaries.push(summary),
                Err(e) if e.is_dataset_local() => {
                    tracing::error!(dataset = %path.display(), error = %e, "title repair failed");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summaries)
    }

    async fn repair_dataset(&self, path: &Path) -> Result<RepairSummary> {
        let rows = read_title_rows(path)?;
        let mut summary = RepairSummary {
            dataset: dataset_name(path),
            ..RepairSummary::default()
        };

        for row in rows {
            if self.cancel.is_cancelled() {
                return Err(LexcheckError::Cancelled);
            }
            if !is_multi_part(&row.title) {
                tracing::debug!(id = %row.id, title = %row.title, "skipped, title has no multi-part structure");
                summary.skipped += 1;
                continue;
            }
            let id = match parse_id(&row.id) {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(id = %row.id, error = %e, "unparseable identifier");
                    summary.errors += 1;
                    continue;
                }
            };

            let item = match self.index.get(id.as_str()).await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    tracing::warn!(%id, "not found in index");
                    summary.not_found += 1;
                    continue;
                }
                Err(fault) => {
                    tracing::error!(%id, %fault, "index lookup failed");
                    summary.errors += 1;
                    continue;
                }
            };

            let stored = item.name().unwrap_or_default();
            if stored == row.title {
                summary.unchanged += 1;
                continue;
            }

            if self.dry_run {
                tracing::info!(%id, from = %stored, to = %row.title, "would update title");
                summary.updated += 1;
                continue;
            }
            if let Some(log) = &self.rollback {
                log.append(&RollbackEntry {
                    timestamp: Utc::now(),
                    dataset: summary.dataset.clone(),
                    id: id.to_string(),
                    previous_title: item.name().map(str::to_string),
                    new_title: row.title.clone(),
                })?;
            }
            match self.index.update_title(id.as_str(), &row.title).await {
                Ok(()) => {
                    tracing::info!(%id, from = %stored, to = %row.title, "updated title");
                    summary.updated += 1;
                }
                Err(fault) => {
                    tracing::error!(%id, %fault, "title update failed");
                    summary.errors += 1;
                }
            }
        }

        tracing::info!(
            dataset = %summary.dataset,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors,
            "title repair finished"
        );
        Ok(summary)
    }
}
