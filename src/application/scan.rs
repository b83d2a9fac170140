//! Scan use case: drive the scanners into a report
//!
//! Three modes cover the memory/fidelity trade-off: `full` aggregates
//! findings in memory into a deduplicated report, `fast` does the same for
//! the working tree only, and `stream` appends raw findings to a JSONL file
//! without aggregation. The source selects which substrate is searched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{Config, Extractor};
use crate::domain::ScanSource;
use crate::infrastructure::aggregator::IndexSink;
use crate::infrastructure::git::history::DEFAULT_PARALLELISM;
use crate::infrastructure::git::HistoryScanner;
use crate::infrastructure::report::{self, normalize_extension, ReportError};
use crate::infrastructure::stream::StreamSink;
use crate::infrastructure::worktree::WorktreeScanner;

/// Revision selector used when none is given.
const DEFAULT_BRANCH_SPEC: &str = "--all";

/// How scan results are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Aggregate findings in memory, write one JSON report.
    #[default]
    Full,
    /// Append raw findings to a JSONL file, bounded memory.
    Stream,
    /// Working tree only, aggregated. Ignores the requested source.
    Fast,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub mode: ScanMode,
    pub source: ScanSource,
    pub branch: Option<String>,
    pub output: PathBuf,
    pub jobs: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            mode: ScanMode::Full,
            source: ScanSource::History,
            branch: None,
            output: PathBuf::from("secrets-report.json"),
            jobs: DEFAULT_PARALLELISM,
        }
    }
}

/// What a scan produced.
#[derive(Debug)]
pub enum ScanSummary {
    Aggregated {
        output: PathBuf,
        secrets_found: usize,
        total_values: usize,
    },
    Streamed {
        output: PathBuf,
        entries: usize,
    },
}

impl ScanSummary {
    pub fn output(&self) -> &Path {
        match self {
            ScanSummary::Aggregated { output, .. } => output,
            ScanSummary::Streamed { output, .. } => output,
        }
    }

    /// Number of secrets (aggregated) or entries (streamed) found.
    pub fn found(&self) -> usize {
        match self {
            ScanSummary::Aggregated { secrets_found, .. } => *secrets_found,
            ScanSummary::Streamed { entries, .. } => *entries,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to open stream output: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Use case wiring the scanners to a sink and emitting the report.
pub struct ScanUseCase {
    extractor: Arc<Extractor>,
}

impl ScanUseCase {
    pub fn new(config: Config) -> Self {
        Self {
            extractor: Arc::new(Extractor::new(Arc::new(config))),
        }
    }

    pub fn config(&self) -> &Config {
        self.extractor.config()
    }

    #[instrument(skip(self), fields(repo = %repo.display()))]
    pub async fn execute(&self, repo: &Path, opts: ScanOptions) -> Result<ScanSummary, ScanError> {
        let branch = opts
            .branch
            .clone()
            .unwrap_or_else(|| DEFAULT_BRANCH_SPEC.to_string());
        let source = match opts.mode {
            ScanMode::Fast => ScanSource::Current,
            _ => opts.source,
        };
        let jobs = if opts.jobs == 0 { DEFAULT_PARALLELISM } else { opts.jobs };

        info!(mode = ?opts.mode, source = %source, branch = %branch, "Starting scan");

        match opts.mode {
            ScanMode::Full | ScanMode::Fast => {
                self.scan_aggregated(repo, &branch, source, jobs, &opts.output)
                    .await
            }
            ScanMode::Stream => self.scan_streamed(repo, &branch, source, jobs, &opts.output).await,
        }
    }

    async fn scan_aggregated(
        &self,
        repo: &Path,
        branch: &str,
        source: ScanSource,
        jobs: usize,
        output: &Path,
    ) -> Result<ScanSummary, ScanError> {
        let sink = Arc::new(IndexSink::new());
        let raw = self.run_scanners(repo, branch, source, jobs, sink.clone()).await;

        let report = sink.take_index().into_report(
            repo.display().to_string(),
            branch_label(branch, source),
        );
        let path = report::write_report(&report, output)?;

        info!(
            raw_findings = raw,
            secrets = report.secrets_found,
            output = %path.display(),
            "Scan completed"
        );
        Ok(ScanSummary::Aggregated {
            output: path,
            secrets_found: report.secrets_found,
            total_values: report.total_values,
        })
    }

    async fn scan_streamed(
        &self,
        repo: &Path,
        branch: &str,
        source: ScanSource,
        jobs: usize,
        output: &Path,
    ) -> Result<ScanSummary, ScanError> {
        let path = normalize_extension(output, "jsonl");
        let sink = Arc::new(StreamSink::create(&path)?);
        self.run_scanners(repo, branch, source, jobs, sink.clone()).await;

        let entries = sink.finish()?;
        info!(entries, output = %path.display(), "Stream scan completed");
        Ok(ScanSummary::Streamed { output: path, entries })
    }

    /// Working tree first, then history, both into the same sink.
    async fn run_scanners(
        &self,
        repo: &Path,
        branch: &str,
        source: ScanSource,
        jobs: usize,
        sink: Arc<dyn crate::infrastructure::FindingSink>,
    ) -> usize {
        let mut raw = 0;
        if source.includes_worktree() {
            raw += WorktreeScanner::new(self.extractor.clone()).scan(repo, sink.as_ref());
        }
        if source.includes_history() {
            raw += HistoryScanner::new(self.extractor.clone(), jobs)
                .scan(repo, branch, sink)
                .await;
        }
        raw
    }
}

fn branch_label(branch: &str, source: ScanSource) -> String {
    match source {
        ScanSource::Current => "HEAD (current files)".to_string(),
        ScanSource::History => branch.to_string(),
        ScanSource::Both => format!("{branch} + current files"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_labels_name_the_substrate() {
        assert_eq!(
            branch_label("--all", ScanSource::Current),
            "HEAD (current files)"
        );
        assert_eq!(branch_label("main", ScanSource::History), "main");
        assert_eq!(branch_label("--all", ScanSource::Both), "--all + current files");
    }

    #[tokio::test]
    async fn fast_mode_scans_only_the_working_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.env"), "password=xK9m$pQ2wR#7vNjL\n").unwrap();

        let use_case = ScanUseCase::new(Config::default());
        let opts = ScanOptions {
            mode: ScanMode::Fast,
            // A history source is overridden by fast mode.
            source: ScanSource::History,
            output: dir.path().join("report.json"),
            ..ScanOptions::default()
        };
        let summary = use_case.execute(dir.path(), opts).await.unwrap();

        let ScanSummary::Aggregated {
            output,
            secrets_found,
            ..
        } = summary
        else {
            panic!("expected aggregated summary");
        };
        assert_eq!(secrets_found, 1);

        let report = report::read_report(&output).unwrap();
        assert_eq!(report.branch, "HEAD (current files)");
        assert_eq!(report.secrets[0].history[0].commits, vec!["current"]);
    }

    #[tokio::test]
    async fn stream_mode_normalizes_extension_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.env"),
            "password=xK9m$pQ2wR#7vNjL\npassword=xK9m$pQ2wR#7vNjL\n",
        )
        .unwrap();

        let use_case = ScanUseCase::new(Config::default());
        let opts = ScanOptions {
            mode: ScanMode::Stream,
            source: ScanSource::Current,
            output: dir.path().join("report.out"),
            ..ScanOptions::default()
        };
        let summary = use_case.execute(dir.path(), opts).await.unwrap();

        match &summary {
            ScanSummary::Streamed { output, entries } => {
                assert_eq!(output.extension().and_then(|e| e.to_str()), Some("jsonl"));
                assert_eq!(*entries, 1);
            }
            _ => panic!("expected streamed summary"),
        }
    }
}
