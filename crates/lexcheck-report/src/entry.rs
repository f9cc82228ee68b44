//! Durable report entries

use chrono::{DateTime, Utc};
use lexcheck_record::{Field, IssueKind, ValidationIssue};
use lexcheck_store::{Discrepancy, ExistenceStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entry severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Worth a look, does not affect consistency
    Warning,
    /// Counts against dataset consistency
    Error,
}

/// What an entry is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// Malformed field or identifier
    ValidationFailure,
    /// Identifier repeated within a dataset
    DuplicateId,
    /// A store refused access
    AccessError,
    /// A store failed after retries
    StoreFault,
    /// Index lookup found nothing
    MissingInIndex,
    /// Content store reported the artifact absent
    MissingInContent,
    /// Dataset could not be processed at all
    DatasetError,
}

impl From<Discrepancy> for EntryKind {
    fn from(d: Discrepancy) -> Self {
        match d {
            Discrepancy::AccessError => EntryKind::AccessError,
            Discrepancy::StoreFault => EntryKind::StoreFault,
            Discrepancy::MissingInIndex => EntryKind::MissingInIndex,
            Discrepancy::MissingInContent => EntryKind::MissingInContent,
        }
    }
}

/// One line of the durable report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Time the entry was appended
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub severity: Severity,
    /// Dataset name
    pub dataset: String,
    /// 1-based data row, absent for dataset-level entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    /// Classification
    pub kind: EntryKind,
    /// Affected field, for validation entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Field>,
    /// Canonical identifier, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable detail
    pub message: String,
}

impl ReportEntry {
    /// Entry for a failing or duplicate validation issue
    ///
    /// Returns `None` for corrections, which only go to the progress channel.
    #[must_use]
    pub fn from_issue(issue: &ValidationIssue) -> Option<Self> {
        let (severity, kind) = match issue.kind {
            IssueKind::Invalid => (Severity::Error, EntryKind::ValidationFailure),
            IssueKind::Duplicate => (Severity::Warning, EntryKind::DuplicateId),
            IssueKind::Corrected => return None,
        };
        Some(Self {
            timestamp: Utc::now(),
            severity,
            dataset: issue.provenance.dataset.clone(),
            row_index: Some(issue.provenance.row_index),
            kind,
            field: Some(issue.field),
            id: None,
            message: issue.reason.clone(),
        })
    }

    /// Entry for an inconsistent identifier; `None` when consistent
    #[must_use]
    pub fn from_status(dataset: &str, row_index: usize, status: &ExistenceStatus) -> Option<Self> {
        let discrepancy = status.discrepancy()?;
        Some(Self {
            timestamp: Utc::now(),
            severity: Severity::Error,
            dataset: dataset.to_string(),
            row_index: Some(row_index),
            kind: discrepancy.into(),
            field: None,
            id: Some(status.id.to_string()),
            message: status.describe(),
        })
    }

    /// Dataset-level failure
    #[must_use]
    pub fn dataset_error(dataset: &str, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity: Severity::Error,
            dataset: dataset.to_string(),
            row_index: None,
            kind: EntryKind::DatasetError,
            field: None,
            id: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.dataset)?;
        if let Some(row) = self.row_index {
            write!(f, ":{row}")?;
        }
        write!(f, " {}", self.message)
    }
}
