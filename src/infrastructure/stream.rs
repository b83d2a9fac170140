//! Streaming JSONL report writer
//!
//! Large repositories skip aggregation entirely: each finding is serialized
//! as one JSON object per line and appended immediately. A single in-memory
//! set of `(file|key|value)` triples suppresses intra-run duplicates, so
//! memory stays proportional to the number of unique findings.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;

use crate::domain::Finding;
use crate::infrastructure::FindingSink;

pub struct StreamWriter {
    writer: BufWriter<File>,
    seen: HashSet<String>,
    written: usize,
}

impl StreamWriter {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            seen: HashSet::new(),
            written: 0,
        })
    }

    /// Append one finding. Returns `false` when the `(file, key, value)`
    /// triple was already written this run.
    pub fn append(&mut self, finding: &Finding) -> io::Result<bool> {
        let dedupe_key = format!("{}|{}|{}", finding.file, finding.key, finding.value);
        if !self.seen.insert(dedupe_key) {
            return Ok(false);
        }

        serde_json::to_writer(&mut self.writer, finding)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(true)
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Shared streaming sink; the lock covers the dedup set and the buffered
/// write together.
pub struct StreamSink {
    inner: Mutex<StreamWriter>,
}

impl StreamSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            inner: Mutex::new(StreamWriter::create(path)?),
        })
    }

    /// Flush buffered output and return the number of entries written.
    pub fn finish(&self) -> io::Result<usize> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.flush()?;
        Ok(guard.written())
    }
}

impl FindingSink for StreamSink {
    fn record(&self, finding: Finding) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = guard.append(&finding) {
            warn!(file = %finding.file, error = %e, "Failed to append stream entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mask_secret;

    fn finding(file: &str, key: &str, value: &str, commit: &str) -> Finding {
        Finding {
            file: file.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            masked_value: mask_secret(value),
            secret_type: "password".to_string(),
            commit: commit.to_string(),
            author: "alice".to_string(),
            date: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn duplicates_are_suppressed_within_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut writer = StreamWriter::create(&path).unwrap();

        assert!(writer.append(&finding("f", "k", "value-one", "c1")).unwrap());
        // Same triple from a different commit is still a duplicate.
        assert!(!writer.append(&finding("f", "k", "value-one", "c2")).unwrap());
        assert!(writer.append(&finding("f", "k", "value-two", "c2")).unwrap());
        writer.flush().unwrap();
        assert_eq!(writer.written(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Finding = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.value, "value-one");
        assert_eq!(first.commit, "c1");
    }

    #[test]
    fn entries_are_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut writer = StreamWriter::create(&path).unwrap();
        writer.append(&finding("a", "k", "multi\nline? no", "c1")).unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        // The embedded newline is JSON-escaped, not literal.
        assert_eq!(content.lines().count(), 1);
    }
}
