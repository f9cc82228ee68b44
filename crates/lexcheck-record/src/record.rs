//! Record types
//!
//! Raw input rows, their canonical form, and the issues produced while
//! moving from one to the other.

use crate::identifier::CanonicalId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Columns every input dataset must carry
pub const REQUIRED_COLUMNS: [&str; 5] = ["jurisdiction", "source", "last_reform_date", "title", "Id"];

/// One input row, untouched
///
/// Extra dataset columns are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Issuing jurisdiction
    pub jurisdiction: String,
    /// Source URL
    pub source: String,
    /// Date of last reform, expected `DD/MM/YYYY`
    pub last_reform_date: String,
    /// Document title
    pub title: String,
    /// Identifier, expected decimal with five fractional digits
    #[serde(rename = "Id")]
    pub id: String,
}

impl RawRecord {
    /// Create raw record from field values
    #[must_use]
    pub fn new(
        jurisdiction: impl Into<String>,
        source: impl Into<String>,
        last_reform_date: impl Into<String>,
        title: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            source: source.into(),
            last_reform_date: last_reform_date.into(),
            title: title.into(),
            id: id.into(),
        }
    }

    /// Raw value of a field
    #[inline]
    #[must_use]
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Jurisdiction => &self.jurisdiction,
            Field::Source => &self.source,
            Field::LastReformDate => &self.last_reform_date,
            Field::Title => &self.title,
            Field::Id => &self.id,
        }
    }
}

/// Normalized record
///
/// `file` is not stored: it is always derived from `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Issuing jurisdiction (unchanged)
    pub jurisdiction: String,
    /// Source URL (unchanged)
    pub source: String,
    /// ISO-8601 date `YYYY-MM-DD`
    pub last_reform_date: String,
    /// Upper-cased title
    pub title: String,
    /// Canonical identifier
    pub id: CanonicalId,
}

impl CanonicalRecord {
    /// Artifact file name for this record (`{id}.txt`)
    #[inline]
    #[must_use]
    pub fn file(&self) -> String {
        self.id.file_name()
    }
}

/// Record fields subject to validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// `jurisdiction` column
    Jurisdiction,
    /// `source` column
    Source,
    /// `last_reform_date` column
    LastReformDate,
    /// `title` column
    Title,
    /// `Id` column
    Id,
}

impl Field {
    /// All fields in validation order
    pub const ALL: [Field; 5] = [
        Field::Jurisdiction,
        Field::Source,
        Field::LastReformDate,
        Field::Title,
        Field::Id,
    ];

    /// Dataset column name
    #[inline]
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Field::Jurisdiction => "jurisdiction",
            Field::Source => "source",
            Field::LastReformDate => "last_reform_date",
            Field::Title => "title",
            Field::Id => "Id",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Where a record came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    /// Dataset name (file name of the input)
    pub dataset: String,
    /// 1-based data row index (header excluded)
    pub row_index: usize,
}

impl Provenance {
    /// Create provenance
    #[inline]
    #[must_use]
    pub fn new(dataset: impl Into<String>, row_index: usize) -> Self {
        Self {
            dataset: dataset.into(),
            row_index,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dataset, self.row_index)
    }
}

/// What happened to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Field is malformed
    Invalid,
    /// Field was rewritten into canonical form
    Corrected,
    /// Identifier already seen earlier in the same dataset
    Duplicate,
}

/// Row-local validation outcome
///
/// Non-fatal: issues accumulate in the report and never halt other rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Originating row
    pub provenance: Provenance,
    /// Affected field
    pub field: Field,
    /// Issue classification
    pub kind: IssueKind,
    /// Human-readable reason
    pub reason: String,
}

impl ValidationIssue {
    /// Create issue
    #[must_use]
    pub fn new(
        provenance: Provenance,
        field: Field,
        kind: IssueKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            provenance,
            field,
            kind,
            reason: reason.into(),
        }
    }

    /// Malformed field
    #[must_use]
    pub fn invalid(provenance: Provenance, field: Field, reason: impl Into<String>) -> Self {
        Self::new(provenance, field, IssueKind::Invalid, reason)
    }

    /// Informational correction
    #[must_use]
    pub fn corrected(provenance: Provenance, field: Field, reason: impl Into<String>) -> Self {
        Self::new(provenance, field, IssueKind::Corrected, reason)
    }

    /// Check if issue is a failure rather than a normalization
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.kind == IssueKind::Invalid
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:?}: {}",
            self.provenance, self.field, self.kind, self.reason
        )
    }
}
