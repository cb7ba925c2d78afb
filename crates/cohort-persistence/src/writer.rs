//! Append-only JSON Lines files.
//!
//! JSON Lines (.jsonl) keeps every record self-contained:
//! - Each line is a complete JSON object
//! - An interrupted write damages at most the last line
//! - Readers skip lines they cannot parse

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;

/// One append-mode JSON Lines file, opened lazily on first write.
pub struct JsonLinesWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    records_written: usize,
}

impl JsonLinesWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            records_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    fn open(&mut self) -> PersistenceResult<&mut BufWriter<File>> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                info!(path = %self.path.display(), "Opening JSON Lines writer (append mode)");
                // Append mode never truncates earlier runs.
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }

    /// Append records and flush them to disk. An empty batch touches nothing.
    pub fn append<'a, T, I>(&mut self, records: I) -> PersistenceResult<usize>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut lines = Vec::new();
        for record in records {
            lines.push(serde_json::to_string(record)?);
        }
        if lines.is_empty() {
            return Ok(0);
        }

        let writer = self.open()?;
        for line in &lines {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;

        self.records_written += lines.len();
        debug!(path = %self.path.display(), records = lines.len(), "Appended JSON Lines");
        Ok(lines.len())
    }

    pub fn append_one<T: Serialize>(&mut self, record: &T) -> PersistenceResult<()> {
        self.append(std::iter::once(record)).map(|_| ())
    }
}

impl Drop for JsonLinesWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!(?e, path = %self.path.display(), "Failed to flush writer on drop");
            }
        }
    }
}

/// Read every parseable record from a JSON Lines file.
///
/// A missing file reads as empty. Corrupt lines are logged and skipped.
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> PersistenceResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(path = %path.display(), line = idx + 1, error = %e, "Skipping corrupt line"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: u32,
        label: String,
    }

    fn rows(range: std::ops::Range<u32>) -> Vec<Row> {
        range
            .map(|id| Row {
                id,
                label: format!("row_{id}"),
            })
            .collect()
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rows.jsonl");
        let mut writer = JsonLinesWriter::new(&path);

        assert_eq!(writer.append(&rows(0..5)).unwrap(), 5);
        drop(writer);

        let read: Vec<Row> = read_json_lines(&path).unwrap();
        assert_eq!(read.len(), 5);
        assert_eq!(read[0].label, "row_0");
    }

    #[test]
    fn test_append_mode() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rows.jsonl");

        JsonLinesWriter::new(&path).append(&rows(0..3)).unwrap();
        JsonLinesWriter::new(&path).append(&rows(3..6)).unwrap();

        let read: Vec<Row> = read_json_lines(&path).unwrap();
        assert_eq!(read.len(), 6, "Should have 6 records total from 2 writers");
    }

    #[test]
    fn test_empty_append_creates_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rows.jsonl");
        let mut writer = JsonLinesWriter::new(&path);

        assert_eq!(writer.append::<Row, _>(&[]).unwrap(), 0);
        assert!(!path.exists());
        assert!(read_json_lines::<Row>(&path).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_line_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rows.jsonl");
        JsonLinesWriter::new(&path).append(&rows(0..2)).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{\"id\": 9, \"lab")
            .unwrap();

        let read: Vec<Row> = read_json_lines(&path).unwrap();
        assert_eq!(read, rows(0..2));
    }
}
