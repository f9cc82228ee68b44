//! Testing utilities for lexcheck workspace
//!
//! Scripted fake stores, dataset fixtures, and a reporter wired to
//! in-memory channels.

#![allow(missing_docs)]

use async_trait::async_trait;
use lexcheck_record::REQUIRED_COLUMNS;
use lexcheck_report::{DiscrepancyReporter, MemoryProgress, MemorySink};
use lexcheck_store::{ContentStore, IndexItem, IndexStore, IndexWriter, StoreFault};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Scripted faults per key, consumed before the real answer
#[derive(Default)]
struct Faults {
    queued: HashMap<String, VecDeque<StoreFault>>,
    always: HashMap<String, StoreFault>,
}

impl Faults {
    fn next(&mut self, key: &str) -> Option<StoreFault> {
        if let Some(fault) = self.always.get(key) {
            return Some(fault.clone());
        }
        self.queued.get_mut(key).and_then(VecDeque::pop_front)
    }
}

#[derive(Default)]
pub struct FakeIndexStore {
    items: Mutex<HashMap<String, IndexItem>>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<String>>,
    updates: Mutex<Vec<(String, String)>>,
    delay: Option<Duration>,
}

impl FakeIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, id: &str) -> Self {
        self.items.lock().insert(id.to_string(), IndexItem::default());
        self
    }

    pub fn with_named(self, id: &str, name: &str) -> Self {
        self.items.lock().insert(id.to_string(), IndexItem::named(name));
        self
    }

    /// Fail the next lookup of `id` with `fault`
    pub fn with_fault(self, id: &str, fault: StoreFault) -> Self {
        self.faults
            .lock()
            .queued
            .entry(id.to_string())
            .or_default()
            .push_back(fault);
        self
    }

    /// Fail every lookup of `id` with `fault`
    pub fn with_persistent_fault(self, id: &str, fault: StoreFault) -> Self {
        self.faults.lock().always.insert(id.to_string(), fault);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Keys looked up, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// `(id, title)` pairs written
    pub fn updates(&self) -> Vec<(String, String)> {
        self.updates.lock().clone()
    }

    pub fn name_of(&self, id: &str) -> Option<String> {
        self.items
            .lock()
            .get(id)
            .and_then(|item| item.name().map(str::to_string))
    }
}

#[async_trait]
impl IndexStore for FakeIndexStore {
    async fn get(&self, id: &str) -> Result<Option<IndexItem>, StoreFault> {
        self.calls.lock().push(id.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(fault) = self.faults.lock().next(id) {
            return Err(fault);
        }
        Ok(self.items.lock().get(id).cloned())
    }
}

#[async_trait]
impl IndexWriter for FakeIndexStore {
    async fn update_title(&self, id: &str, title: &str) -> Result<(), StoreFault> {
        let mut items = self.items.lock();
        let item = items
            .get_mut(id)
            .ok_or_else(|| StoreFault::other(format!("no item {id}")))?;
        item.set_name(title);
        self.updates.lock().push((id.to_string(), title.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeContentStore {
    keys: Mutex<HashSet<String>>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
    hook: Option<Hook>,
}

impl FakeContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(self, key: &str) -> Self {
        self.keys.lock().insert(key.to_string());
        self
    }

    /// Add the artifact for `id` under the default `txt/` prefix
    pub fn with_id(self, id: &str) -> Self {
        self.with_key(&content_key(id))
    }

    pub fn with_fault(self, key: &str, fault: StoreFault) -> Self {
        self.faults
            .lock()
            .queued
            .entry(key.to_string())
            .or_default()
            .push_back(fault);
        self
    }

    pub fn with_persistent_fault(self, key: &str, fault: StoreFault) -> Self {
        self.faults.lock().always.insert(key.to_string(), fault);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Run `hook` with the key at the start of every probe
    pub fn with_hook(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ContentStore for FakeContentStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreFault> {
        self.calls.lock().push(key.to_string());
        if let Some(hook) = &self.hook {
            hook(key);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(fault) = self.faults.lock().next(key) {
            return Err(fault);
        }
        Ok(self.keys.lock().contains(key))
    }
}

/// Content key for `id` under the default prefix
pub fn content_key(id: &str) -> String {
    format!("txt/{id}.txt")
}

/// One input row in required-column order:
/// `[jurisdiction, source, last_reform_date, title, Id]`
pub type Row<'a> = [&'a str; 5];

/// The example row used throughout the docs
pub const SAMPLE_ROW: Row<'static> = [
    "Federal",
    "https://leyes.gob.mx/x",
    "15/03/2019",
    "ley general",
    "7.00023",
];

/// Row with the given identifier and otherwise valid fields
pub fn row_with_id(id: &str) -> [String; 5] {
    [
        "Federal".to_string(),
        "https://leyes.gob.mx/ley".to_string(),
        "01/02/2020".to_string(),
        "ley de prueba".to_string(),
        id.to_string(),
    ]
}

/// Write a dataset with the required header
pub fn write_dataset<S: AsRef<str>>(dir: &Path, name: &str, rows: &[[S; 5]]) -> PathBuf {
    write_dataset_with_header(dir, name, &REQUIRED_COLUMNS, rows)
}

/// Write a dataset with an arbitrary header
pub fn write_dataset_with_header<S: AsRef<str>, const N: usize>(
    dir: &Path,
    name: &str,
    header: &[&str],
    rows: &[[S; N]],
) -> PathBuf {
    let path = dir.join(name);
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer.write_record(header).unwrap();
    for row in rows {
        let fields: Vec<&str> = row.iter().map(AsRef::as_ref).collect();
        writer.write_record(&fields).unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Reporter over in-memory channels
pub fn memory_reporter() -> (Arc<DiscrepancyReporter>, Arc<MemorySink>, Arc<MemoryProgress>) {
    let sink = Arc::new(MemorySink::new());
    let progress = Arc::new(MemoryProgress::new());
    let reporter = Arc::new(DiscrepancyReporter::new(sink.clone(), progress.clone()));
    (reporter, sink, progress)
}
