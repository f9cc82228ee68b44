//! Filesystem-backed stores
//!
//! - [`JsonIndexStore`]: a JSON object snapshot `{ "<id>": { "name": ... } }`
//! - [`DirectoryContentStore`]: artifacts laid out as `<root>/<key>`
//!
//! Used by the command-line front end and by tests that want real I/O.

use crate::error::StoreFault;
use crate::store::{ContentStore, IndexItem, IndexStore, IndexWriter};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Index held in memory, loaded from and persisted to a JSON file
#[derive(Debug)]
pub struct JsonIndexStore {
    path: PathBuf,
    items: RwLock<BTreeMap<String, IndexItem>>,
    // Held from snapshot to rename so snapshots land in update order
    persist: tokio::sync::Mutex<()>,
}

impl JsonIndexStore {
    /// Load snapshot from `path`
    ///
    /// # Errors
    /// Unreadable file or malformed JSON.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreFault> {
        let path = path.into();
        let context = path.display().to_string();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StoreFault::from_io(&context, &e))?;
        let items: BTreeMap<String, IndexItem> = serde_json::from_slice(&bytes)
            .map_err(|e| StoreFault::other(format!("{context}: {e}")))?;

        tracing::info!(path = %context, items = items.len(), "loaded index snapshot");
        Ok(Self::from_items(path, items))
    }

    /// Create store from items; persisted on first write
    #[must_use]
    pub fn from_items(path: impl Into<PathBuf>, items: BTreeMap<String, IndexItem>) -> Self {
        Self {
            path: path.into(),
            items: RwLock::new(items),
            persist: tokio::sync::Mutex::new(()),
        }
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Snapshot path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, snapshot: Vec<u8>) -> Result<(), StoreFault> {
        let tmp = self.path.with_extension("json.tmp");
        let context = self.path.display().to_string();
        tokio::fs::write(&tmp, snapshot)
            .await
            .map_err(|e| StoreFault::from_io(&context, &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreFault::from_io(&context, &e))
    }
}

#[async_trait]
impl IndexStore for JsonIndexStore {
    async fn get(&self, id: &str) -> Result<Option<IndexItem>, StoreFault> {
        Ok(self.items.read().get(id).cloned())
    }
}

#[async_trait]
impl IndexWriter for JsonIndexStore {
    async fn update_title(&self, id: &str, title: &str) -> Result<(), StoreFault> {
        let _persist = self.persist.lock().await;
        let snapshot = {
            let mut items = self.items.write();
            let item = items
                .get_mut(id)
                .ok_or_else(|| StoreFault::other(format!("no index item for {id}")))?;
            item.set_name(title);
            serde_json::to_vec_pretty(&*items)
                .map_err(|e| StoreFault::other(format!("serialize index: {e}")))?
        };
        self.persist(snapshot).await
    }
}

/// Content artifacts stored as plain files under a root directory
#[derive(Debug, Clone)]
pub struct DirectoryContentStore {
    root: PathBuf,
}

impl DirectoryContentStore {
    /// Create store rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StoreFault> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(StoreFault::other(format!("invalid content key: {key:?}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentStore for DirectoryContentStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreFault> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreFault::from_io(key, &e)),
        }
    }
}
