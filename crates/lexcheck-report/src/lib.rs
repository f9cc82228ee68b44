//! lexcheck discrepancy report
//!
//! Two channels with different audiences:
//!
//! - **progress**: per-record `ok` / `found` / `missing` / `rejected` /
//!   `corrected` events for a live console ([`ProgressSink`])
//! - **durable**: validation failures, missing-in-store and access errors,
//!   each tagged with `(dataset, row_index)` ([`DurableSink`])
//!
//! [`DiscrepancyReporter`] fans records out to both and keeps per-dataset
//! counts for [`DatasetSummary`].

#![warn(missing_docs)]

pub mod entry;
pub mod error;
pub mod reporter;
pub mod sink;

// Re-exports
pub use entry::{EntryKind, ReportEntry, Severity};
pub use error::{ReportError, Result};
pub use reporter::{DatasetSummary, DiscrepancyReporter};
pub use sink::{
    DurableSink, JsonlSink, MemoryProgress, MemorySink, ProgressEvent, ProgressKind,
    ProgressSink, TracingProgress,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
