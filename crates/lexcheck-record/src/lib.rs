//! lexcheck record model
//!
//! Pure, side-effect free handling of legal-document dataset rows.
//!
//! # Overview
//!
//! - **RawRecord**: one input row exactly as read from a dataset
//! - **CanonicalRecord**: the normalized form written to corrected datasets
//! - **Field validators**: jurisdiction, source URL, reform date, title
//! - **Identifier canonicalizer**: fixed five-digit decimal identifiers
//! - **RecordNormalizer**: `RawRecord -> Result<NormalizedRecord, Vec<ValidationIssue>>`
//!
//! # Example
//!
//! ```rust
//! use lexcheck_record::{Provenance, RawRecord, RecordNormalizer};
//!
//! let raw = RawRecord::new("Federal", "https://leyes.gob.mx/x", "15/03/2019", "ley general", "7.00023");
//! let normalized = RecordNormalizer::default()
//!     .normalize(&Provenance::new("leyes.csv", 1), &raw)
//!     .unwrap();
//!
//! assert_eq!(normalized.record.last_reform_date, "2019-03-15");
//! assert_eq!(normalized.record.file(), "7.00023.txt");
//! ```

#![warn(missing_docs)]

pub mod identifier;
pub mod normalize;
pub mod record;

// Re-exports
pub use identifier::{parse_id, CanonicalId, IdFormatError, IdPolicy, FRACTION_DIGITS};
pub use normalize::{
    convert_date, normalize_title, validate_jurisdiction, validate_url, FieldPolicy,
    FieldValidationError, Normalized, NormalizedRecord, RecordNormalizer,
};
pub use record::{
    CanonicalRecord, Field, IssueKind, Provenance, RawRecord, ValidationIssue, REQUIRED_COLUMNS,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for record normalization
    pub use crate::{
        CanonicalId, CanonicalRecord, Field, FieldPolicy, IdPolicy, IssueKind, Provenance,
        RawRecord, RecordNormalizer, ValidationIssue,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
