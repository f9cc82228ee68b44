//! lexcheck stores
//!
//! Capability-level access to the two external stores every record must be
//! present in, and the verifier that classifies what they report.
//!
//! # Overview
//!
//! - **IndexStore**: point lookup by identifier (`get`)
//! - **ContentStore**: existence check by key (`exists`), keyed `txt/{id}.txt`
//! - **StoreFault**: access-denied vs transient vs other, never "absent"
//! - **RetryPolicy**: bounded exponential backoff for transient faults
//! - **ExistenceVerifier**: both probes, concurrently, classified into an
//!   [`ExistenceStatus`]
//!
//! Network adapters live outside this crate; [`local`] offers adapters over
//! a mirrored snapshot on disk.

#![warn(missing_docs)]

pub mod error;
pub mod local;
pub mod retry;
pub mod store;
pub mod verifier;

// Re-exports
pub use error::{FaultKind, StoreFault};
pub use local::{DirectoryContentStore, JsonIndexStore};
pub use retry::{BackoffPolicy, RetryPolicy};
pub use store::{ContentStore, IndexItem, IndexStore, IndexWriter};
pub use verifier::{ContentStatus, Discrepancy, ExistenceStatus, ExistenceVerifier, IndexStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
