//! Existence verification
//!
//! Issues the index probe and the content probe for one canonical identifier
//! concurrently, retries transient faults per probe, and classifies the pair
//! of outcomes. A record is consistent only when the index has it and the
//! content store reports it present.

use crate::error::StoreFault;
use crate::retry::RetryPolicy;
use crate::store::{ContentStore, IndexStore};
use lexcheck_record::CanonicalId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Index probe outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum IndexStatus {
    /// Item exists
    Found,
    /// Lookup succeeded, no item
    NotFound,
    /// Authorization failure
    AccessDenied(String),
    /// Any other fault after retries
    Error(String),
}

/// Content probe outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ContentStatus {
    /// Artifact exists
    Present,
    /// Store answered "not found"
    Absent,
    /// Authorization failure, never treated as absent
    AccessDenied(String),
    /// Transient or unclassified fault after retries
    TransientError(String),
}

/// Category of an inconsistent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Discrepancy {
    /// A store refused access
    AccessError,
    /// A store failed after retries
    StoreFault,
    /// Index has no item for the identifier
    MissingInIndex,
    /// Content store has no artifact for the identifier
    MissingInContent,
}

impl Discrepancy {
    /// Stable label used in reports
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Discrepancy::AccessError => "access-error",
            Discrepancy::StoreFault => "store-fault",
            Discrepancy::MissingInIndex => "missing-in-index",
            Discrepancy::MissingInContent => "missing-in-content",
        }
    }

    /// Check if the identifier was judged missing (as opposed to unreachable)
    #[inline]
    #[must_use]
    pub fn is_missing(self) -> bool {
        matches!(self, Discrepancy::MissingInIndex | Discrepancy::MissingInContent)
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both probe outcomes for one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceStatus {
    /// Probed identifier
    pub id: CanonicalId,
    /// Content store key that was probed
    pub content_key: String,
    /// Index outcome
    pub index: IndexStatus,
    /// Content outcome
    pub content: ContentStatus,
}

impl ExistenceStatus {
    /// Check if the index has the identifier
    #[inline]
    #[must_use]
    pub fn found_in_index(&self) -> bool {
        self.index == IndexStatus::Found
    }

    /// Index found and content present
    #[inline]
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.found_in_index() && self.content == ContentStatus::Present
    }

    /// Single category for an inconsistent identifier
    ///
    /// Access errors outrank faults, faults outrank absence; index absence
    /// outranks content absence.
    #[must_use]
    pub fn discrepancy(&self) -> Option<Discrepancy> {
        if self.is_consistent() {
            return None;
        }
        let access = matches!(self.index, IndexStatus::AccessDenied(_))
            || matches!(self.content, ContentStatus::AccessDenied(_));
        let fault = matches!(self.index, IndexStatus::Error(_))
            || matches!(self.content, ContentStatus::TransientError(_));

        Some(if access {
            Discrepancy::AccessError
        } else if fault {
            Discrepancy::StoreFault
        } else if self.index == IndexStatus::NotFound {
            Discrepancy::MissingInIndex
        } else {
            Discrepancy::MissingInContent
        })
    }

    /// One-line description for logs and reports
    #[must_use]
    pub fn describe(&self) -> String {
        match self.discrepancy() {
            None => format!("consistent: {}", self.id),
            Some(d) => format!(
                "{d}: {} (index: {}, content {}: {})",
                self.id,
                describe_index(&self.index),
                self.content_key,
                describe_content(&self.content),
            ),
        }
    }
}

fn describe_index(status: &IndexStatus) -> String {
    match status {
        IndexStatus::Found => "found".to_string(),
        IndexStatus::NotFound => "not found".to_string(),
        IndexStatus::AccessDenied(m) => format!("access denied ({m})"),
        IndexStatus::Error(m) => format!("error ({m})"),
    }
}

fn describe_content(status: &ContentStatus) -> String {
    match status {
        ContentStatus::Present => "present".to_string(),
        ContentStatus::Absent => "absent".to_string(),
        ContentStatus::AccessDenied(m) => format!("access denied ({m})"),
        ContentStatus::TransientError(m) => format!("error ({m})"),
    }
}

/// Probes both stores for canonical identifiers
#[derive(Clone)]
pub struct ExistenceVerifier {
    index: Arc<dyn IndexStore>,
    content: Arc<dyn ContentStore>,
    retry: RetryPolicy,
    probe_timeout: Duration,
    content_prefix: String,
}

impl fmt::Debug for ExistenceVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExistenceVerifier")
            .field("retry", &self.retry)
            .field("probe_timeout", &self.probe_timeout)
            .field("content_prefix", &self.content_prefix)
            .finish_non_exhaustive()
    }
}

impl ExistenceVerifier {
    /// Create verifier with default retry, timeout and `txt` prefix
    #[must_use]
    pub fn new(index: Arc<dyn IndexStore>, content: Arc<dyn ContentStore>) -> Self {
        Self {
            index,
            content,
            retry: RetryPolicy::default(),
            probe_timeout: Duration::from_secs(10),
            content_prefix: "txt".to_string(),
        }
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// With per-attempt timeout
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// With content key prefix
    #[inline]
    #[must_use]
    pub fn with_content_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.content_prefix = prefix.into();
        self
    }

    /// Probe both stores for `id`
    pub async fn verify(&self, id: &CanonicalId) -> ExistenceStatus {
        let content_key = id.content_key(&self.content_prefix);
        let (index, content) = tokio::join!(self.probe_index(id), self.probe_content(&content_key));

        let status = ExistenceStatus {
            id: id.clone(),
            content_key,
            index,
            content,
        };
        tracing::trace!(id = %status.id, consistent = status.is_consistent(), "verified");
        status
    }

    async fn probe_index(&self, id: &CanonicalId) -> IndexStatus {
        let result = self
            .retry
            .run(|| with_timeout(self.probe_timeout, self.index.get(id.as_str())))
            .await;

        match result {
            Ok(Some(_)) => IndexStatus::Found,
            Ok(None) => IndexStatus::NotFound,
            Err(fault) if fault.is_access_denied() => IndexStatus::AccessDenied(fault.message),
            Err(fault) => {
                tracing::error!(id = %id, %fault, "index probe failed");
                IndexStatus::Error(fault.message)
            }
        }
    }

    async fn probe_content(&self, key: &str) -> ContentStatus {
        let result = self
            .retry
            .run(|| with_timeout(self.probe_timeout, self.content.exists(key)))
            .await;

        match result {
            Ok(true) => ContentStatus::Present,
            Ok(false) => ContentStatus::Absent,
            Err(fault) if fault.is_access_denied() => {
                tracing::error!(key, %fault, "access denied to content store");
                ContentStatus::AccessDenied(fault.message)
            }
            Err(fault) => {
                tracing::error!(key, %fault, "content probe failed");
                ContentStatus::TransientError(fault.message)
            }
        }
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    probe: impl Future<Output = Result<T, StoreFault>>,
) -> Result<T, StoreFault> {
    tokio::time::timeout(timeout, probe)
        .await
        .unwrap_or_else(|_| Err(StoreFault::transient(format!("probe timed out after {timeout:?}"))))
}
