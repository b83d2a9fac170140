//! Working-tree scanner
//!
//! Walks the repository root depth-first, pruning `.git`, and applies the
//! same containment/extraction/suppression pipeline as the history scanner
//! to every surviving file. Findings carry the synthetic `current`
//! commit/author and the scan time.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Extractor;
use crate::domain::{mask_secret, Finding, CURRENT_PSEUDO_COMMIT};
use crate::infrastructure::FindingSink;

/// Files larger than this are skipped.
const MAX_FILE_SIZE: u64 = 1024 * 1024;

pub struct WorktreeScanner {
    extractor: Arc<Extractor>,
}

impl WorktreeScanner {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        Self { extractor }
    }

    /// Scan the working tree sequentially. Returns the number of findings
    /// emitted; unreadable files are skipped.
    pub fn scan(&self, repo: &Path, sink: &dyn FindingSink) -> usize {
        let keywords = self.extractor.config().all_keywords();
        let mut findings = 0;
        let mut files_scanned = 0;

        let walker = WalkDir::new(repo).into_iter().filter_entry(|entry| {
            !(entry.file_type().is_dir() && entry.file_name() == ".git")
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Error accessing directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_path = entry
                .path()
                .strip_prefix(repo)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();

            if self.extractor.config().should_ignore_file(&rel_path) {
                continue;
            }

            match entry.metadata() {
                Ok(meta) if meta.len() > MAX_FILE_SIZE => continue,
                Ok(_) => {}
                Err(e) => {
                    warn!(file = %rel_path, error = %e, "Failed to read metadata");
                    continue;
                }
            }

            let bytes = match std::fs::read(entry.path()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(file = %rel_path, error = %e, "Failed to read file");
                    continue;
                }
            };
            files_scanned += 1;

            let text = String::from_utf8_lossy(&bytes);
            let now = Utc::now().to_rfc3339();

            for line in text.lines() {
                for keyword in &keywords {
                    if let Some((key, value)) = self.extractor.candidate(keyword, line) {
                        sink.record(Finding {
                            file: rel_path.clone(),
                            key,
                            masked_value: mask_secret(&value),
                            value,
                            secret_type: keyword.clone(),
                            commit: CURRENT_PSEUDO_COMMIT.to_string(),
                            author: CURRENT_PSEUDO_COMMIT.to_string(),
                            date: now.clone(),
                        });
                        findings += 1;
                    }
                }
            }
        }

        debug!(files_scanned, findings, "Working-tree scan completed");
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::infrastructure::aggregator::IndexSink;

    fn scanner() -> WorktreeScanner {
        WorktreeScanner::new(Arc::new(Extractor::new(Arc::new(Config::default()))))
    }

    #[test]
    fn finds_secrets_in_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.env"),
            "password=xK9m$pQ2wR#7vNjL\nusername=alice\n",
        )
        .unwrap();

        let sink = IndexSink::new();
        let count = scanner().scan(dir.path(), &sink);
        // Both `password` and `pass` match the line; the index folds the
        // repeat into one occurrence.
        assert_eq!(count, 2);

        let secrets = sink.take_index().into_secrets();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].key, "password");
        assert_eq!(secrets[0].history[0].commits, vec![CURRENT_PSEUDO_COMMIT]);
        assert_eq!(secrets[0].authors, vec![CURRENT_PSEUDO_COMMIT]);
    }

    #[test]
    fn ignored_and_oversized_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        // Markdown is in the default ignore list.
        std::fs::write(dir.path().join("README.md"), "password=xK9m$pQ2wR#7vNjL\n").unwrap();
        // Oversized file.
        let mut big = String::from("password=xK9m$pQ2wR#7vNjL\n");
        big.push_str(&"x".repeat(MAX_FILE_SIZE as usize + 1));
        std::fs::write(dir.path().join("big.env"), big).unwrap();

        let sink = IndexSink::new();
        assert_eq!(scanner().scan(dir.path(), &sink), 0);
    }

    #[test]
    fn git_directory_is_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let git_dir = dir.path().join(".git");
        std::fs::create_dir(&git_dir).unwrap();
        std::fs::write(git_dir.join("config.env"), "password=xK9m$pQ2wR#7vNjL\n").unwrap();

        let sink = IndexSink::new();
        assert_eq!(scanner().scan(dir.path(), &sink), 0);
    }
}
