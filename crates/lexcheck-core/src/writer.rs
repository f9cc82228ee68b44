//! Corrected record writer
//!
//! Output rows are staged in a temporary file beside the destination and only
//! become visible through an atomic rename once the whole dataset has been
//! written. Dropping a [`StagedDataset`] without committing leaves nothing
//! behind.

use crate::error::{LexcheckError, Result};
use lexcheck_record::CanonicalRecord;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Output columns, byte-wise lexicographic
pub const OUTPUT_COLUMNS: [&str; 6] = ["Id", "file", "jurisdiction", "last_reform_date", "source", "title"];

/// One output row; field order is the column order
#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    #[serde(rename = "Id")]
    id: &'a str,
    file: String,
    jurisdiction: &'a str,
    last_reform_date: &'a str,
    source: &'a str,
    title: &'a str,
}

impl<'a> From<&'a CanonicalRecord> for OutputRow<'a> {
    fn from(record: &'a CanonicalRecord) -> Self {
        Self {
            id: record.id.as_str(),
            file: record.file(),
            jurisdiction: &record.jurisdiction,
            last_reform_date: &record.last_reform_date,
            source: &record.source,
            title: &record.title,
        }
    }
}

/// Places corrected datasets next to their inputs or in a fixed directory
#[derive(Debug, Clone)]
pub struct CorrectedRecordWriter {
    output_dir: Option<PathBuf>,
    suffix: String,
}

impl CorrectedRecordWriter {
    /// Create writer
    #[must_use]
    pub fn new(output_dir: Option<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            output_dir,
            suffix: suffix.into(),
        }
    }

    /// Destination for the corrected form of `input`: `{stem}{suffix}.csv`
    #[must_use]
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = self
            .output_dir
            .clone()
            .or_else(|| input.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        dir.join(format!("{stem}{}.csv", self.suffix))
    }

    /// Begin staging the corrected form of `input`
    ///
    /// # Errors
    /// Output directory cannot be created or written.
    pub fn stage(&self, input: &Path) -> Result<StagedDataset> {
        let target = self.output_path(input);
        if target == input {
            return Err(LexcheckError::dataset_io(input, "output would replace the input dataset"));
        }
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| LexcheckError::dataset_io(&dir, e))?;

        let staged = NamedTempFile::new_in(&dir).map_err(|e| LexcheckError::dataset_io(&dir, e))?;
        let file = staged.reopen().map_err(|e| LexcheckError::dataset_io(staged.path(), e))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer
            .write_record(OUTPUT_COLUMNS)
            .map_err(|e| LexcheckError::dataset_io(&target, e))?;

        tracing::debug!(output = %target.display(), staging = %staged.path().display(), "staging output");
        Ok(StagedDataset {
            target,
            staged,
            writer,
            rows: 0,
        })
    }
}

/// Output being written; invisible until [`StagedDataset::commit`]
#[derive(Debug)]
pub struct StagedDataset {
    target: PathBuf,
    staged: NamedTempFile,
    writer: csv::Writer<File>,
    rows: usize,
}

impl StagedDataset {
    /// Append one record
    ///
    /// # Errors
    /// Write failure.
    pub fn write(&mut self, record: &CanonicalRecord) -> Result<()> {
        self.writer
            .serialize(OutputRow::from(record))
            .map_err(|e| LexcheckError::dataset_io(&self.target, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and atomically replace the destination
    ///
    /// # Errors
    /// Flush or rename failure; the staged file is removed.
    pub fn commit(self) -> Result<PathBuf> {
        let Self {
            target,
            staged,
            writer,
            rows,
        } = self;
        let file = writer
            .into_inner()
            .map_err(|e| LexcheckError::dataset_io(&target, e.error()))?;
        file.sync_all().map_err(|e| LexcheckError::dataset_io(&target, e))?;
        drop(file);

        staged
            .persist(&target)
            .map_err(|e| LexcheckError::dataset_io(&target, e.error))?;
        tracing::info!(output = %target.display(), rows, "wrote corrected dataset");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexcheck_record::CanonicalId;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(id: &str, title: &str) -> CanonicalRecord {
        CanonicalRecord {
            jurisdiction: "Federal".into(),
            source: "https://leyes.gob.mx/x".into(),
            last_reform_date: "2019-03-15".into(),
            title: title.into(),
            id: id.parse::<CanonicalId>().unwrap(),
        }
    }

    #[test]
    fn output_path_uses_suffix() {
        let writer = CorrectedRecordWriter::new(None, "_corrected");
        assert_eq!(
            writer.output_path(Path::new("/data/leyes.csv")),
            PathBuf::from("/data/leyes_corrected.csv")
        );

        let writer = CorrectedRecordWriter::new(Some("/out".into()), "_v2");
        assert_eq!(
            writer.output_path(Path::new("/data/leyes.csv")),
            PathBuf::from("/out/leyes_v2.csv")
        );
    }

    #[test]
    fn committed_output_has_sorted_columns_and_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("leyes.csv");
        let writer = CorrectedRecordWriter::new(None, "_corrected");

        let mut staged = writer.stage(&input).unwrap();
        staged.write(&record("7.00023", "LEY GENERAL")).unwrap();
        staged.write(&record("1.00000", "LEY, DE AGUAS")).unwrap();
        let out = staged.commit().unwrap();

        let text = std::fs::read_to_string(out).unwrap();
        assert_eq!(
            text,
            "Id,file,jurisdiction,last_reform_date,source,title\n\
             7.00023,7.00023.txt,Federal,2019-03-15,https://leyes.gob.mx/x,LEY GENERAL\n\
             1.00000,1.00000.txt,Federal,2019-03-15,https://leyes.gob.mx/x,\"LEY, DE AGUAS\"\n"
        );
    }

    #[test]
    fn dropped_stage_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("leyes.csv");
        let writer = CorrectedRecordWriter::new(None, "_corrected");

        {
            let mut staged = writer.stage(&input).unwrap();
            staged.write(&record("7.00023", "LEY GENERAL")).unwrap();
        }

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn output_columns_are_sorted() {
        let mut sorted = OUTPUT_COLUMNS;
        sorted.sort_unstable();
        assert_eq!(sorted, OUTPUT_COLUMNS);
    }
}
