//! Store capabilities
//!
//! The core only ever sees these traits. Real adapters (managed key-value
//! tables, object storage) implement them elsewhere; tests use fakes.

use crate::error::StoreFault;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Item returned by an index lookup
///
/// Only presence matters for verification; `name` is used by title
/// maintenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexItem {
    /// Stored attributes, including `name` when present
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl IndexItem {
    /// Attribute holding the document title
    pub const NAME_ATTRIBUTE: &'static str = "name";

    /// Create item with a name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let mut attributes = serde_json::Map::new();
        attributes.insert(
            Self::NAME_ATTRIBUTE.to_string(),
            serde_json::Value::String(name.into()),
        );
        Self { attributes }
    }

    /// Stored title, if any
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attributes
            .get(Self::NAME_ATTRIBUTE)
            .and_then(serde_json::Value::as_str)
    }

    /// Replace stored title
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.attributes.insert(
            Self::NAME_ATTRIBUTE.to_string(),
            serde_json::Value::String(name.into()),
        );
    }
}

/// Key-value index: authoritative identity registry
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Point lookup by identifier
    ///
    /// `Ok(None)` is "not found"; faults are never reported as absence.
    async fn get(&self, id: &str) -> Result<Option<IndexItem>, StoreFault>;
}

/// Corrective write path, used only by explicit maintenance
#[async_trait]
pub trait IndexWriter: IndexStore {
    /// Overwrite the stored title of an existing item
    async fn update_title(&self, id: &str, title: &str) -> Result<(), StoreFault>;
}

/// Content/blob store holding one artifact per identifier
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Existence check without fetching content
    ///
    /// `Ok(false)` is "absent"; authorization failures are
    /// [`FaultKind::AccessDenied`](crate::FaultKind::AccessDenied).
    async fn exists(&self, key: &str) -> Result<bool, StoreFault>;
}
