//! Batch orchestrator
//!
//! Per dataset:
//! - read and header-check the file
//! - normalize rows one at a time, in order
//! - verify identifiers on a bounded worker pool
//! - stage the corrected dataset in source order and commit it
//!
//! Row problems go to the report; dataset problems fail that dataset only;
//! cancellation stops new verification work, lets in-flight probes finish,
//! and never commits the dataset in progress.

use crate::cancel::CancelToken;
use crate::config::LexcheckConfig;
use crate::dataset::{dataset_name, discover_datasets, read_dataset};
use crate::error::{LexcheckError, Result};
use crate::lifecycle::{Lifecycle, RecordState};
use crate::writer::CorrectedRecordWriter;
use lexcheck_record::{
    CanonicalId, CanonicalRecord, Field, IssueKind, Provenance, RawRecord, RecordNormalizer,
    ValidationIssue,
};
use lexcheck_report::{DatasetSummary, DiscrepancyReporter};
use lexcheck_store::{ContentStore, ExistenceVerifier, IndexStore};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Per-dataset counts, in processing order
    pub datasets: Vec<DatasetSummary>,
    /// Corrected datasets committed
    pub outputs: Vec<PathBuf>,
    /// Datasets that failed as a whole
    pub failed_datasets: usize,
    /// Run stopped early
    pub cancelled: bool,
}

impl RunSummary {
    /// Every dataset completed with zero error-channel entries
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        !self.cancelled
            && self.failed_datasets == 0
            && self.datasets.iter().all(DatasetSummary::is_consistent)
    }
}

/// A validated row waiting for verification and output
#[derive(Debug)]
struct Pending {
    provenance: Provenance,
    record: CanonicalRecord,
    lifecycle: Lifecycle,
}

/// Drives datasets through normalization, verification and output
#[derive(Debug)]
pub struct BatchOrchestrator {
    config: LexcheckConfig,
    normalizer: RecordNormalizer,
    verifier: ExistenceVerifier,
    writer: CorrectedRecordWriter,
    reporter: Arc<DiscrepancyReporter>,
    cancel: CancelToken,
}

impl BatchOrchestrator {
    /// Create orchestrator over the two stores
    ///
    /// # Errors
    /// Invalid configuration.
    pub fn new(
        config: LexcheckConfig,
        index: Arc<dyn IndexStore>,
        content: Arc<dyn ContentStore>,
        reporter: Arc<DiscrepancyReporter>,
    ) -> Result<Self> {
        config.validate()?;
        let verifier = ExistenceVerifier::new(index, content)
            .with_retry(config.retry.clone())
            .with_probe_timeout(config.probe_timeout())
            .with_content_prefix(config.content_prefix.clone());
        let writer = CorrectedRecordWriter::new(config.output_dir.clone(), config.output_suffix.clone());

        Ok(Self {
            normalizer: config.normalizer(),
            config,
            verifier,
            writer,
            reporter,
            cancel: CancelToken::new(),
        })
    }

    /// With externally owned cancel token
    #[inline]
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts this orchestrator
    #[inline]
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Reporter shared by all datasets
    #[inline]
    #[must_use]
    pub fn reporter(&self) -> &Arc<DiscrepancyReporter> {
        &self.reporter
    }

    /// Run every input dataset found in `dir`
    ///
    /// # Errors
    /// `dir` cannot be listed, or the report cannot be flushed.
    pub async fn run_dir(&self, dir: &Path) -> Result<RunSummary> {
        let datasets = discover_datasets(dir, &self.config.output_suffix)?;
        if datasets.is_empty() {
            tracing::warn!(dir = %dir.display(), "no datasets found");
        }
        self.run(&datasets).await
    }

    /// Run datasets in order; a failing dataset does not stop the others
    ///
    /// The durable report is flushed as each dataset finishes.
    ///
    /// # Errors
    /// Only a report flush failure; dataset failures are in the summary.
    pub async fn run(&self, datasets: &[PathBuf]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for path in datasets {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let name = dataset_name(path);
            match self.process_dataset(path).await {
                Ok(output) => summary.outputs.push(output),
                Err(LexcheckError::Cancelled) => {
                    tracing::warn!(dataset = %name, "dataset abandoned, no output written");
                    summary.cancelled = true;
                }
                Err(e) if e.is_dataset_local() => {
                    tracing::error!(dataset = %name, error = %e, "dataset failed");
                    self.reporter.record_dataset_error(&name, e.to_string());
                    summary.failed_datasets += 1;
                }
                Err(e) => return Err(e),
            }
            summary.datasets.push(self.reporter.finalize(&name));
            self.reporter.flush()?;
            if summary.cancelled {
                break;
            }
        }

        tracing::info!(
            datasets = summary.datasets.len(),
            failed = summary.failed_datasets,
            cancelled = summary.cancelled,
            consistent = summary.is_consistent(),
            "run complete"
        );
        Ok(summary)
    }

    /// Process one dataset end to end and return the committed output path
    ///
    /// # Errors
    /// Dataset-level failure, or [`LexcheckError::Cancelled`].
    pub async fn process_dataset(&self, path: &Path) -> Result<PathBuf> {
        let name = dataset_name(path);
        self.reporter.begin_dataset(&name);
        tracing::info!(dataset = %name, "processing dataset");

        let rows = read_dataset(path)?;
        let mut pending = self.normalize_rows(&name, &rows)?;
        self.verify(&name, &mut pending).await?;

        if self.cancel.is_cancelled() {
            return Err(LexcheckError::Cancelled);
        }

        let mut staged = self.writer.stage(path)?;
        for row in &mut pending {
            staged.write(&row.record)?;
            advance(&mut row.lifecycle, &row.provenance, RecordState::Written)?;
        }
        staged.commit()
    }

    fn normalize_rows(&self, dataset: &str, rows: &[RawRecord]) -> Result<Vec<Pending>> {
        let mut pending = Vec::with_capacity(rows.len());
        let mut first_seen: HashMap<CanonicalId, usize> = HashMap::new();

        for (i, raw) in rows.iter().enumerate() {
            let provenance = Provenance::new(dataset, i + 1);
            let mut lifecycle = Lifecycle::new();

            match self.normalizer.normalize(&provenance, raw) {
                Ok(normalized) => {
                    advance(&mut lifecycle, &provenance, RecordState::Normalized)?;
                    self.reporter.record_validated(&provenance, &normalized);

                    let id = normalized.record.id.clone();
                    if let Some(first) = first_seen.get(&id) {
                        self.reporter.record_issue(&ValidationIssue::new(
                            provenance.clone(),
                            Field::Id,
                            IssueKind::Duplicate,
                            format!("{id} already appears at row {first}"),
                        ));
                    } else {
                        first_seen.insert(id, provenance.row_index);
                    }

                    pending.push(Pending {
                        provenance,
                        record: normalized.record,
                        lifecycle,
                    });
                }
                Err(issues) => {
                    advance(&mut lifecycle, &provenance, RecordState::Rejected)?;
                    tracing::debug!(row = %provenance, issues = issues.len(), "row rejected");
                    self.reporter.record_rejected(&provenance, &issues);
                }
            }
        }
        Ok(pending)
    }

    async fn verify(&self, dataset: &str, pending: &mut [Pending]) -> Result<()> {
        let permits = Arc::new(Semaphore::new(self.config.worker_pool_size));
        let mut tasks = JoinSet::new();

        for (slot, row) in pending.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            if self.cancel.is_cancelled() {
                break;
            }

            let verifier = self.verifier.clone();
            let reporter = Arc::clone(&self.reporter);
            let provenance = row.provenance.clone();
            let id = row.record.id.clone();
            tasks.spawn(async move {
                let status = verifier.verify(&id).await;
                reporter.record_status(&provenance, &status);
                drop(permit);
                slot
            });
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(slot) => {
                    let row = &mut pending[slot];
                    if let Err(e) = row.lifecycle.advance(RecordState::Verified) {
                        failure.get_or_insert_with(|| format!("{}: {e}", row.provenance));
                    }
                }
                Err(e) => {
                    tracing::error!(dataset, error = %e, "verification task failed");
                    failure.get_or_insert_with(|| e.to_string());
                }
            }
        }

        match failure {
            Some(message) if !self.cancel.is_cancelled() => Err(LexcheckError::VerificationTask {
                dataset: dataset.to_string(),
                message,
            }),
            _ => Ok(()),
        }
    }
}

/// Move a row's lifecycle forward; an illegal move fails the dataset
fn advance(lifecycle: &mut Lifecycle, provenance: &Provenance, to: RecordState) -> Result<()> {
    lifecycle
        .advance(to)
        .map_err(|e| LexcheckError::VerificationTask {
            dataset: provenance.dataset.clone(),
            message: format!("{provenance}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lexcheck_report::{MemoryProgress, MemorySink};
    use lexcheck_store::{IndexItem, StoreFault};

    struct Everything;

    #[async_trait]
    impl IndexStore for Everything {
        async fn get(&self, _id: &str) -> std::result::Result<Option<IndexItem>, StoreFault> {
            Ok(Some(IndexItem::default()))
        }
    }

    #[async_trait]
    impl ContentStore for Everything {
        async fn exists(&self, _key: &str) -> std::result::Result<bool, StoreFault> {
            Ok(true)
        }
    }

    fn orchestrator(config: LexcheckConfig) -> Result<BatchOrchestrator> {
        let reporter = Arc::new(DiscrepancyReporter::new(
            Arc::new(MemorySink::new()),
            Arc::new(MemoryProgress::new()),
        ));
        BatchOrchestrator::new(config, Arc::new(Everything), Arc::new(Everything), reporter)
    }

    #[test]
    fn invalid_config_is_refused() {
        let err = orchestrator(LexcheckConfig::new().with_workers(0)).unwrap_err();
        assert!(matches!(err, LexcheckError::Config(_)));
    }

    #[test]
    fn run_summary_consistency() {
        let mut summary = RunSummary::default();
        assert!(summary.is_consistent());
        summary.cancelled = true;
        assert!(!summary.is_consistent());
    }

    #[tokio::test]
    async fn cancelled_before_start_processes_nothing() {
        let orchestrator = orchestrator(LexcheckConfig::new()).unwrap();
        orchestrator.cancel_token().cancel();
        let summary = orchestrator.run(&[PathBuf::from("/nonexistent.csv")]).await.unwrap();
        assert!(summary.cancelled);
        assert!(summary.datasets.is_empty());
    }
}
