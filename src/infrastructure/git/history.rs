//! Per-keyword pickaxe searches over the repository history
//!
//! Each keyword in the search vocabulary runs its own `git log -S<keyword>`
//! subprocess with patch output; the stdout stream is parsed line by line
//! and surviving candidates are pushed into the shared sink. Keywords are
//! independent and run concurrently behind a semaphore. A failing
//! subprocess costs only that keyword's findings.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::Extractor;
use crate::domain::{mask_secret, Finding};
use crate::infrastructure::git::diff::DiffWalker;
use crate::infrastructure::FindingSink;

/// Line buffer for the subprocess stdout. Diff lines of at least this size
/// must be accepted; the reader grows past it when needed.
const LINE_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Default number of keywords searched concurrently.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Scans repository history by driving one pickaxe subprocess per keyword.
pub struct HistoryScanner {
    extractor: Arc<Extractor>,
    parallelism: usize,
}

impl HistoryScanner {
    pub fn new(extractor: Arc<Extractor>, parallelism: usize) -> Self {
        Self {
            extractor,
            parallelism: parallelism.max(1),
        }
    }

    /// Search every configured keyword across `branch` (an arbitrary
    /// revision selector, `--all` by default) and feed findings into the
    /// sink. Returns the number of findings emitted.
    pub async fn scan(&self, repo: &Path, branch: &str, sink: Arc<dyn FindingSink>) -> usize {
        let keywords = self.extractor.config().all_keywords();
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();

        for keyword in keywords {
            let semaphore = semaphore.clone();
            let extractor = self.extractor.clone();
            let sink = sink.clone();
            let repo = repo.to_path_buf();
            let branch = branch.to_string();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return 0,
                };
                scan_keyword(&extractor, &repo, &keyword, &branch, sink.as_ref()).await
            });
        }

        let mut total = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(count) => total += count,
                Err(e) => warn!(error = %e, "Keyword scan task failed"),
            }
        }
        total
    }
}

/// Run one pickaxe search and stream its diff output through the walker.
async fn scan_keyword(
    extractor: &Extractor,
    repo: &PathBuf,
    keyword: &str,
    branch: &str,
    sink: &dyn FindingSink,
) -> usize {
    let mut args: Vec<String> = vec![
        "log".to_string(),
        branch.to_string(),
        format!("-S{keyword}"),
        "--pretty=format:COMMIT_START|%H|%an|%aI".to_string(),
        "-p".to_string(),
    ];

    let excluded = &extractor.config().exclude_binary_extensions;
    if !excluded.is_empty() {
        args.push("--".to_string());
        for ext in excluded {
            args.push(format!(":!*{ext}"));
        }
    }

    let mut child = match Command::new("git")
        .args(&args)
        .current_dir(repo)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!(keyword, error = %e, "Failed to spawn git log");
            return 0;
        }
    };

    let Some(stdout) = child.stdout.take() else {
        warn!(keyword, "No stdout pipe for git log");
        return 0;
    };

    let mut reader = BufReader::with_capacity(LINE_BUFFER_CAPACITY, stdout);
    let mut walker = DiffWalker::new(|file: &str| extractor.config().should_ignore_file(file));
    let mut raw = Vec::new();
    let mut findings = 0;

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(keyword, error = %e, "Error reading git log output");
                break;
            }
        }

        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\n', '\r']);

        if let Some((commit, file, content)) = walker.observe(line) {
            if let Some((key, value)) = extractor.candidate(keyword, content) {
                let finding = Finding {
                    file: file.to_string(),
                    key,
                    masked_value: mask_secret(&value),
                    value,
                    secret_type: keyword.to_string(),
                    commit: commit.hash.clone(),
                    author: commit.author.clone(),
                    date: commit.date.clone(),
                };
                sink.record(finding);
                findings += 1;
            }
        }
    }

    match child.wait().await {
        Ok(status) if !status.success() => {
            debug!(keyword, code = ?status.code(), "git log exited non-zero");
        }
        Ok(_) => {}
        Err(e) => warn!(keyword, error = %e, "Failed to wait for git log"),
    }

    debug!(keyword, findings, "Keyword search finished");
    findings
}
