//! lexcheck core
//!
//! Batch pipeline for legal-document datasets:
//! - Reads datasets and fails fast on missing columns
//! - Normalizes every row and rejects invalid ones
//! - Verifies identifiers against the index and content stores
//! - Writes corrected datasets atomically, in source order
//! - Repairs index titles through an explicit maintenance pass with a rollback log
//!
//! # Example
//!
//! ```rust,ignore
//! use lexcheck_core::{BatchOrchestrator, LexcheckConfig};
//! use lexcheck_report::DiscrepancyReporter;
//! use std::sync::Arc;
//!
//! # async fn example(index: Arc<dyn lexcheck_store::IndexStore>, content: Arc<dyn lexcheck_store::ContentStore>)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = BatchOrchestrator::new(
//!     LexcheckConfig::new().with_workers(4),
//!     index,
//!     content,
//!     Arc::new(DiscrepancyReporter::default()),
//! )?;
//!
//! let summary = orchestrator.run_dir("./csv".as_ref()).await?;
//! println!("{} datasets, consistent: {}", summary.datasets.len(), summary.is_consistent());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cancel;
pub mod config;
pub mod dataset;
pub mod error;
pub mod lifecycle;
pub mod maintenance;
pub mod orchestrator;
pub mod writer;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use config::LexcheckConfig;
pub use dataset::{discover_datasets, discover_outputs, read_dataset};
pub use error::{ConfigError, LexcheckError, Result};
pub use lifecycle::{allowed_transitions, validate_transition, Lifecycle, RecordState, TransitionError};
pub use maintenance::{is_multi_part, RepairSummary, RollbackEntry, RollbackLog, TitleMaintenance};
pub use orchestrator::{BatchOrchestrator, RunSummary};
pub use writer::{CorrectedRecordWriter, StagedDataset, OUTPUT_COLUMNS};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running lexcheck
    pub use crate::{
        BatchOrchestrator, CancelToken, LexcheckConfig, LexcheckError, RunSummary, TitleMaintenance,
    };
    pub use lexcheck_report::{DatasetSummary, DiscrepancyReporter};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
