//! Report channels
//!
//! - durable: [`DurableSink`], one destination per run ([`JsonlSink`], [`MemorySink`])
//! - progress: [`ProgressSink`], high volume and ephemeral ([`TracingProgress`], [`MemoryProgress`])

use crate::entry::ReportEntry;
use crate::error::{ReportError, Result};
use lexcheck_record::Provenance;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Destination for durable entries
pub trait DurableSink: Send + Sync {
    /// Persist one entry
    ///
    /// # Errors
    /// Encoding or I/O failure.
    fn append(&self, entry: &ReportEntry) -> Result<()>;

    /// Push buffered entries to the destination
    ///
    /// # Errors
    /// I/O failure.
    fn flush(&self) -> Result<()>;
}

/// JSON Lines file, one entry per line
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    /// Create (truncate) the report file
    ///
    /// # Errors
    /// Directory or file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ReportError::Open {
                path: path.clone(),
                source,
            })?;
        }
        let file = File::create(&path).map_err(|source| ReportError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Report file path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DurableSink for JsonlSink {
    fn append(&self, entry: &ReportEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.writer.lock().write_all(&line)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

/// In-memory durable sink
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<ReportEntry>>,
}

impl MemorySink {
    /// Create empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries persisted so far
    #[must_use]
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.lock().clone()
    }
}

impl DurableSink for MemorySink {
    fn append(&self, entry: &ReportEntry) -> Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Per-record live event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    /// Identifier present in both stores
    Ok,
    /// Index has the identifier
    Found,
    /// Identifier missing or unreachable in a store
    Missing,
    /// Record excluded from output
    Rejected,
    /// Record rewritten into canonical form
    Corrected,
}

/// Progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Originating row
    pub provenance: Provenance,
    /// Event kind
    pub kind: ProgressKind,
    /// Short detail
    pub detail: String,
}

impl ProgressEvent {
    /// Create event
    #[must_use]
    pub fn new(provenance: Provenance, kind: ProgressKind, detail: impl Into<String>) -> Self {
        Self {
            provenance,
            kind,
            detail: detail.into(),
        }
    }
}

/// Destination for progress events
pub trait ProgressSink: Send + Sync {
    /// Emit one event; must not block
    fn emit(&self, event: &ProgressEvent);
}

/// Emits progress through `tracing` with target `lexcheck::progress`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: &ProgressEvent) {
        match event.kind {
            ProgressKind::Missing | ProgressKind::Rejected => tracing::warn!(
                target: "lexcheck::progress",
                row = %event.provenance,
                kind = ?event.kind,
                "{}",
                event.detail
            ),
            _ => tracing::info!(
                target: "lexcheck::progress",
                row = %event.provenance,
                kind = ?event.kind,
                "{}",
                event.detail
            ),
        }
    }
}

/// Captures progress events in memory
#[derive(Debug, Default)]
pub struct MemoryProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemoryProgress {
    /// Create empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events emitted so far
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// Number of events of `kind`
    #[must_use]
    pub fn count(&self, kind: ProgressKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }
}

impl ProgressSink for MemoryProgress {
    fn emit(&self, event: &ProgressEvent) {
        self.events.lock().push(event.clone());
    }
}
