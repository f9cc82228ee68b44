//! Field normalization
//!
//! Each validator takes one raw field value and either returns its canonical
//! form or a [`FieldValidationError`]. [`RecordNormalizer`] runs all of them
//! over a [`RawRecord`] and attaches provenance to every outcome.

use crate::identifier::IdPolicy;
use crate::record::{CanonicalRecord, Field, Provenance, RawRecord, ValidationIssue};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Heuristic syntactic check, not RFC 3986.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:http|ftp)s?://",
        r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|",
        r"localhost|",
        r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}|",
        r"\[?[A-F0-9]*:[A-F0-9:]+\]?)",
        r"(?::\d+)?",
        r"(?:/?|[/?]\S+)$",
    ))
    .expect("url regex must compile")
});

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("date regex must compile"));

/// A single field failed validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct FieldValidationError {
    /// Offending field
    pub field: Field,
    /// Raw value as read
    pub value: String,
    /// Why it was rejected
    pub reason: String,
}

impl FieldValidationError {
    fn new(field: Field, value: &str, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Value plus whether normalization changed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized<T> {
    /// Canonical value
    pub value: T,
    /// True when the canonical value differs from the input
    pub corrected: bool,
}

/// Validate jurisdiction: non-empty text, passed through unchanged
///
/// # Errors
/// `FieldValidationError` for empty or whitespace-only values.
pub fn validate_jurisdiction(value: &str) -> Result<String, FieldValidationError> {
    if value.trim().is_empty() {
        return Err(FieldValidationError::new(
            Field::Jurisdiction,
            value,
            "missing jurisdiction",
        ));
    }
    Ok(value.to_string())
}

/// Validate source URL
///
/// Accepts `http`, `https`, `ftp` and `ftps` with a domain name,
/// `localhost`, IPv4 or bracketed IPv6 host, optional port and an optional
/// path/query suffix. Case-insensitive.
///
/// # Errors
/// `FieldValidationError` when empty or not URL-shaped.
pub fn validate_url(value: &str) -> Result<String, FieldValidationError> {
    if value.is_empty() {
        return Err(FieldValidationError::new(
            Field::Source,
            value,
            "missing source URL",
        ));
    }
    if !URL_PATTERN.is_match(value) {
        return Err(FieldValidationError::new(
            Field::Source,
            value,
            format!("invalid source URL: {value}"),
        ));
    }
    Ok(value.to_string())
}

/// Convert `DD/MM/YYYY` to ISO-8601 `YYYY-MM-DD`
///
/// Strict: two-digit day and month, four-digit year, a real calendar date.
/// Already-ISO input is rejected.
///
/// # Errors
/// `FieldValidationError` on any other format.
pub fn convert_date(value: &str) -> Result<String, FieldValidationError> {
    if value.is_empty() {
        return Err(FieldValidationError::new(
            Field::LastReformDate,
            value,
            "missing last_reform_date",
        ));
    }
    let invalid = || {
        FieldValidationError::new(
            Field::LastReformDate,
            value,
            format!("invalid date format: {value}"),
        )
    };
    if !DATE_PATTERN.is_match(value) {
        return Err(invalid());
    }
    let date = NaiveDate::parse_from_str(value, "%d/%m/%Y").map_err(|_| invalid())?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Upper-case title
///
/// # Errors
/// `FieldValidationError` for empty or whitespace-only titles.
pub fn normalize_title(value: &str) -> Result<Normalized<String>, FieldValidationError> {
    if value.trim().is_empty() {
        return Err(FieldValidationError::new(Field::Title, value, "missing title"));
    }
    let upper = value.to_uppercase();
    let corrected = upper != value;
    Ok(Normalized {
        value: upper,
        corrected,
    })
}

/// What to do with a record whose non-identifier field fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldPolicy {
    /// Reject the record
    #[default]
    Reject,
    /// Report the failure, keep the original value, keep the record
    Retain,
}

/// Successful normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    /// Canonical record
    pub record: CanonicalRecord,
    /// Corrections, plus retained failures under [`FieldPolicy::Retain`]
    pub issues: Vec<ValidationIssue>,
}

impl NormalizedRecord {
    /// Check if any field was rewritten
    #[inline]
    #[must_use]
    pub fn was_corrected(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.kind == crate::record::IssueKind::Corrected)
    }
}

/// Pure record normalizer
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordNormalizer {
    id_policy: IdPolicy,
    field_policy: FieldPolicy,
}

impl RecordNormalizer {
    /// Create normalizer with explicit policies
    #[inline]
    #[must_use]
    pub fn new(id_policy: IdPolicy, field_policy: FieldPolicy) -> Self {
        Self {
            id_policy,
            field_policy,
        }
    }

    /// Normalize one raw record
    ///
    /// Every field is checked, so a rejected record reports all of its
    /// problems at once. An identifier failure always rejects.
    ///
    /// # Errors
    /// The failures that rejected the record (never empty).
    pub fn normalize(
        &self,
        provenance: &Provenance,
        raw: &RawRecord,
    ) -> Result<NormalizedRecord, Vec<ValidationIssue>> {
        let mut failures = Vec::new();
        let mut issues = Vec::new();

        let jurisdiction = Self::field(
            validate_jurisdiction(&raw.jurisdiction),
            &raw.jurisdiction,
            provenance,
            &mut failures,
        );
        let source = Self::field(validate_url(&raw.source), &raw.source, provenance, &mut failures);
        let last_reform_date = Self::field(
            convert_date(&raw.last_reform_date),
            &raw.last_reform_date,
            provenance,
            &mut failures,
        );

        let title = match normalize_title(&raw.title) {
            Ok(Normalized { value, corrected }) => {
                if corrected {
                    issues.push(ValidationIssue::corrected(
                        provenance.clone(),
                        Field::Title,
                        format!("title upper-cased: '{}' -> '{value}'", raw.title),
                    ));
                }
                value
            }
            Err(e) => {
                failures.push(ValidationIssue::invalid(
                    provenance.clone(),
                    e.field,
                    e.to_string(),
                ));
                raw.title.clone()
            }
        };

        let id = match self.id_policy.canonicalize(&raw.id) {
            Ok(id) => {
                if id.as_str() != raw.id {
                    issues.push(ValidationIssue::corrected(
                        provenance.clone(),
                        Field::Id,
                        format!("Id re-rendered: '{}' -> '{id}'", raw.id),
                    ));
                }
                Some(id)
            }
            Err(e) => {
                failures.push(ValidationIssue::invalid(
                    provenance.clone(),
                    Field::Id,
                    e.to_string(),
                ));
                None
            }
        };

        let Some(id) = id else {
            return Err(failures);
        };
        if !failures.is_empty() {
            match self.field_policy {
                FieldPolicy::Reject => return Err(failures),
                FieldPolicy::Retain => issues.extend(failures),
            }
        }

        Ok(NormalizedRecord {
            record: CanonicalRecord {
                jurisdiction,
                source,
                last_reform_date,
                title,
                id,
            },
            issues,
        })
    }

    /// Unwrap a field result, recording failure and falling back to the raw value
    fn field(
        result: Result<String, FieldValidationError>,
        raw: &str,
        provenance: &Provenance,
        failures: &mut Vec<ValidationIssue>,
    ) -> String {
        result.unwrap_or_else(|e| {
            failures.push(ValidationIssue::invalid(
                provenance.clone(),
                e.field,
                e.to_string(),
            ));
            raw.to_string()
        })
    }
}
