//! Discrepancy reporter
//!
//! The only shared mutable structure of a run. Appends are serialized by a
//! mutex held for the push alone; per-dataset counters live in a sharded map
//! so concurrent verification tasks rarely contend.

use crate::entry::{ReportEntry, Severity};
use crate::error::{ReportError, Result};
use crate::sink::{DurableSink, MemorySink, ProgressEvent, ProgressKind, ProgressSink, TracingProgress};
use dashmap::DashMap;
use lexcheck_record::{IssueKind, NormalizedRecord, Provenance, ValidationIssue};
use lexcheck_store::ExistenceStatus;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    rows: usize,
    validated: usize,
    corrected: usize,
    rejected: usize,
    consistent: usize,
    missing: usize,
    errored: usize,
    warnings: usize,
    error_entries: usize,
    failed: bool,
}

/// Per-dataset counts produced by [`DiscrepancyReporter::finalize`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Dataset name
    pub dataset: String,
    /// Data rows read
    pub rows: usize,
    /// Rows that passed normalization
    pub validated: usize,
    /// Validated rows rewritten into canonical form
    pub corrected: usize,
    /// Rows excluded from output
    pub rejected: usize,
    /// Identifiers present in both stores
    pub consistent: usize,
    /// Identifiers judged missing from a store
    pub missing: usize,
    /// Identifiers whose probes were denied or faulted
    pub errored: usize,
    /// Warning entries (duplicates)
    pub warnings: usize,
    /// Durable error-channel entries
    pub error_entries: usize,
    /// Dataset failed as a whole
    pub failed: bool,
}

impl DatasetSummary {
    /// A dataset with zero error-channel entries is fully consistent
    #[inline]
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.error_entries == 0 && !self.failed
    }
}

/// Append-only report with a progress channel and a durable channel
pub struct DiscrepancyReporter {
    entries: Mutex<Vec<ReportEntry>>,
    counters: DashMap<String, Counters>,
    durable: Arc<dyn DurableSink>,
    progress: Arc<dyn ProgressSink>,
    dropped: AtomicUsize,
}

impl std::fmt::Debug for DiscrepancyReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscrepancyReporter")
            .field("entries", &self.entries.lock().len())
            .field("datasets", &self.counters.len())
            .finish_non_exhaustive()
    }
}

impl Default for DiscrepancyReporter {
    fn default() -> Self {
        Self::new(Arc::new(MemorySink::new()), Arc::new(TracingProgress))
    }
}

impl DiscrepancyReporter {
    /// Create reporter over the given channels
    #[must_use]
    pub fn new(durable: Arc<dyn DurableSink>, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            counters: DashMap::new(),
            durable,
            progress,
            dropped: AtomicUsize::new(0),
        }
    }

    /// Register a dataset so it appears in summaries even if empty
    pub fn begin_dataset(&self, dataset: &str) {
        self.counters.entry(dataset.to_string()).or_default();
        tracing::debug!(dataset, "dataset started");
    }

    /// Record one validation issue
    ///
    /// Failures and duplicates go to the durable channel; corrections only
    /// to the progress channel.
    pub fn record_issue(&self, issue: &ValidationIssue) {
        if issue.kind == IssueKind::Corrected {
            self.emit(
                issue.provenance.clone(),
                ProgressKind::Corrected,
                format!("{}: {}", issue.field, issue.reason),
            );
            return;
        }
        if let Some(entry) = ReportEntry::from_issue(issue) {
            self.append(entry);
        }
    }

    /// Record a row that passed normalization, with its issues
    pub fn record_validated(&self, provenance: &Provenance, normalized: &NormalizedRecord) {
        self.update(&provenance.dataset, |c| {
            c.rows += 1;
            c.validated += 1;
            if normalized.was_corrected() {
                c.corrected += 1;
            }
        });
        for issue in &normalized.issues {
            self.record_issue(issue);
        }
    }

    /// Record a row excluded from output
    pub fn record_rejected(&self, provenance: &Provenance, issues: &[ValidationIssue]) {
        self.update(&provenance.dataset, |c| {
            c.rows += 1;
            c.rejected += 1;
        });
        for issue in issues {
            self.record_issue(issue);
        }
        let fields: Vec<String> = issues.iter().map(|i| i.field.to_string()).collect();
        self.emit(
            provenance.clone(),
            ProgressKind::Rejected,
            format!("invalid {}", fields.join(", ")),
        );
    }

    /// Record the existence outcome for a validated row
    pub fn record_status(&self, provenance: &Provenance, status: &ExistenceStatus) {
        if status.found_in_index() {
            self.emit(provenance.clone(), ProgressKind::Found, status.id.to_string());
        }

        match status.discrepancy() {
            None => {
                self.update(&provenance.dataset, |c| c.consistent += 1);
                self.emit(provenance.clone(), ProgressKind::Ok, status.id.to_string());
            }
            Some(discrepancy) => {
                self.update(&provenance.dataset, |c| {
                    if discrepancy.is_missing() {
                        c.missing += 1;
                    } else {
                        c.errored += 1;
                    }
                });
                self.emit(provenance.clone(), ProgressKind::Missing, status.describe());
                if let Some(entry) =
                    ReportEntry::from_status(&provenance.dataset, provenance.row_index, status)
                {
                    self.append(entry);
                }
            }
        }
    }

    /// Record a failure of a whole dataset
    pub fn record_dataset_error(&self, dataset: &str, message: impl Into<String>) {
        self.update(dataset, |c| c.failed = true);
        self.append(ReportEntry::dataset_error(dataset, message));
    }

    /// Counts for one dataset
    #[must_use]
    pub fn finalize(&self, dataset: &str) -> DatasetSummary {
        let c = self
            .counters
            .get(dataset)
            .map(|c| *c.value())
            .unwrap_or_default();
        let summary = DatasetSummary {
            dataset: dataset.to_string(),
            rows: c.rows,
            validated: c.validated,
            corrected: c.corrected,
            rejected: c.rejected,
            consistent: c.consistent,
            missing: c.missing,
            errored: c.errored,
            warnings: c.warnings,
            error_entries: c.error_entries,
            failed: c.failed,
        };
        tracing::info!(
            dataset,
            rows = summary.rows,
            rejected = summary.rejected,
            missing = summary.missing,
            errored = summary.errored,
            consistent = summary.is_consistent(),
            "dataset finalized"
        );
        summary
    }

    /// Durable entries appended so far, in append order
    #[must_use]
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.lock().clone()
    }

    /// Durable entries re-sorted by dataset and row
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<ReportEntry> {
        let mut entries = self.entries();
        entries.sort_by(|a, b| {
            (a.dataset.as_str(), a.row_index).cmp(&(b.dataset.as_str(), b.row_index))
        });
        entries
    }

    /// Flush the durable channel
    ///
    /// # Errors
    /// Sink flush failed, or earlier appends never reached the sink.
    pub fn flush(&self) -> Result<()> {
        self.durable.flush()?;
        match self.dropped.load(Ordering::Relaxed) {
            0 => Ok(()),
            count => Err(ReportError::Dropped { count }),
        }
    }

    fn append(&self, entry: ReportEntry) {
        self.update(&entry.dataset, |c| match entry.severity {
            Severity::Error => c.error_entries += 1,
            Severity::Warning => c.warnings += 1,
            Severity::Info => {}
        });
        if let Err(e) = self.durable.append(&entry) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, entry = %entry, "durable report append failed");
        }
        self.entries.lock().push(entry);
    }

    fn update(&self, dataset: &str, f: impl FnOnce(&mut Counters)) {
        if let Some(mut c) = self.counters.get_mut(dataset) {
            f(c.value_mut());
            return;
        }
        let mut c = self.counters.entry(dataset.to_string()).or_default();
        f(c.value_mut());
    }

    fn emit(&self, provenance: Provenance, kind: ProgressKind, detail: String) {
        self.progress.emit(&ProgressEvent::new(provenance, kind, detail));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKind;
    use crate::sink::MemoryProgress;
    use lexcheck_record::{CanonicalId, Field};
    use lexcheck_store::{ContentStatus, IndexStatus};
    use pretty_assertions::assert_eq;
    use std::thread;

    fn reporter() -> (DiscrepancyReporter, Arc<MemorySink>, Arc<MemoryProgress>) {
        let sink = Arc::new(MemorySink::new());
        let progress = Arc::new(MemoryProgress::new());
        (
            DiscrepancyReporter::new(sink.clone(), progress.clone()),
            sink,
            progress,
        )
    }

    fn status(index: IndexStatus, content: ContentStatus) -> ExistenceStatus {
        let id: CanonicalId = "7.00023".parse().unwrap();
        ExistenceStatus {
            content_key: id.content_key("txt"),
            id,
            index,
            content,
        }
    }

    #[test]
    fn consistent_status_stays_off_durable_channel() {
        let (reporter, sink, progress) = reporter();
        reporter.record_status(
            &Provenance::new("a.csv", 1),
            &status(IndexStatus::Found, ContentStatus::Present),
        );

        assert!(sink.entries().is_empty());
        assert_eq!(progress.count(ProgressKind::Ok), 1);
        assert_eq!(progress.count(ProgressKind::Found), 1);
        assert!(reporter.finalize("a.csv").is_consistent());
    }

    #[test]
    fn access_denied_is_an_error_entry() {
        let (reporter, sink, _) = reporter();
        reporter.record_status(
            &Provenance::new("a.csv", 4),
            &status(IndexStatus::Found, ContentStatus::AccessDenied("403".into())),
        );

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::AccessError);
        assert_eq!(entries[0].row_index, Some(4));

        let summary = reporter.finalize("a.csv");
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.missing, 0);
        assert!(!summary.is_consistent());
    }

    #[test]
    fn rejected_row_counts_and_reports_each_issue() {
        let (reporter, sink, progress) = reporter();
        let p = Provenance::new("a.csv", 2);
        let issues = vec![
            ValidationIssue::invalid(p.clone(), Field::Source, "not a url"),
            ValidationIssue::invalid(p.clone(), Field::LastReformDate, "bad date"),
        ];
        reporter.record_rejected(&p, &issues);

        assert_eq!(sink.entries().len(), 2);
        assert_eq!(progress.count(ProgressKind::Rejected), 1);
        let summary = reporter.finalize("a.csv");
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.error_entries, 2);
    }

    #[test]
    fn duplicates_warn_without_breaking_consistency() {
        let (reporter, _, _) = reporter();
        let p = Provenance::new("a.csv", 9);
        reporter.record_issue(&ValidationIssue::new(p, Field::Id, IssueKind::Duplicate, "seen at row 3"));

        let summary = reporter.finalize("a.csv");
        assert_eq!(summary.warnings, 1);
        assert!(summary.is_consistent());
    }

    #[test]
    fn dataset_error_fails_dataset() {
        let (reporter, _, _) = reporter();
        reporter.record_dataset_error("b.csv", "missing column Id");
        let summary = reporter.finalize("b.csv");
        assert!(summary.failed);
        assert!(!summary.is_consistent());
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let (reporter, sink, _) = reporter();
        let reporter = Arc::new(reporter);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let reporter = Arc::clone(&reporter);
                thread::spawn(move || {
                    for row in 0..50 {
                        reporter.record_status(
                            &Provenance::new("a.csv", t * 50 + row + 1),
                            &status(IndexStatus::NotFound, ContentStatus::Absent),
                        );
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(sink.entries().len(), 400);
        assert_eq!(reporter.finalize("a.csv").missing, 400);
        let sorted = reporter.sorted_entries();
        assert!(sorted.windows(2).all(|w| w[0].row_index <= w[1].row_index));
    }
}
