//! Report persistence and secret loading
//!
//! Aggregated reports persist as one JSON document (`.json`); streaming
//! reports are line-oriented (`.jsonl`). Loading secrets for redaction
//! works from either format and infers whether the report covers the
//! working tree, history, or both from the commit ids it contains.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::{Finding, ScanReport, ScanSource, CURRENT_PSEUDO_COMMIT};

/// Line buffer when reading streaming reports; mirrors the scanner's bound.
const LINE_BUFFER_CAPACITY: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to read report: {0}")]
    Io(#[from] io::Error),

    #[error("invalid report format: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Force `path` to carry the given extension.
pub fn normalize_extension(path: &Path, extension: &str) -> PathBuf {
    let mut path = path.to_path_buf();
    path.set_extension(extension);
    path
}

/// Write an aggregated report, normalizing the extension to `.json`.
/// Returns the path actually written.
pub fn write_report(report: &ScanReport, path: &Path) -> Result<PathBuf, ReportError> {
    let path = normalize_extension(path, "json");
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    debug!(path = %path.display(), secrets = report.secrets_found, "Report written");
    Ok(path)
}

pub fn read_report(path: &Path) -> Result<ScanReport, ReportError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Secrets loaded from a report for redaction.
#[derive(Debug)]
pub struct LoadedSecrets {
    /// Distinct values, longest first.
    pub values: Vec<String>,
    /// Files the secrets were found in.
    pub files: BTreeSet<String>,
    /// Substrate the report covers.
    pub source: ScanSource,
}

/// Load distinct secret values from an aggregated or streaming report,
/// dispatched on the file extension.
pub fn load_secrets(path: &Path) -> Result<LoadedSecrets, ReportError> {
    if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        load_from_stream(path)
    } else {
        let report = read_report(path)?;
        Ok(load_from_report(&report))
    }
}

/// Infer the substrate of an aggregated report from its commit ids. An
/// empty report resolves to `Both`, the conservative default.
pub fn detect_report_source(report: &ScanReport) -> ScanSource {
    let mut commits = report
        .secrets
        .iter()
        .flat_map(|s| s.history.iter())
        .flat_map(|h| h.commits.iter());
    detect_source(&mut commits)
}

fn detect_source<'a>(commits: &mut dyn Iterator<Item = &'a String>) -> ScanSource {
    let mut has_current = false;
    let mut has_history = false;
    for commit in commits {
        if commit == CURRENT_PSEUDO_COMMIT {
            has_current = true;
        } else if !commit.is_empty() {
            has_history = true;
        }
    }
    match (has_current, has_history) {
        (true, false) => ScanSource::Current,
        (false, true) => ScanSource::History,
        _ => ScanSource::Both,
    }
}

/// A value already redacted must never be treated as a secret again.
fn usable_value(value: &str) -> bool {
    !value.is_empty() && !value.contains("REMOVED")
}

fn load_from_report(report: &ScanReport) -> LoadedSecrets {
    let mut values = BTreeSet::new();
    let mut files = BTreeSet::new();

    for secret in &report.secrets {
        if !secret.file.is_empty() {
            files.insert(secret.file.clone());
        }
        for history in &secret.history {
            if usable_value(&history.value) {
                values.insert(history.value.clone());
            }
        }
    }

    LoadedSecrets {
        values: sort_longest_first(values),
        files,
        source: detect_report_source(report),
    }
}

fn load_from_stream(path: &Path) -> Result<LoadedSecrets, ReportError> {
    let file = File::open(path)?;
    let reader = BufReader::with_capacity(LINE_BUFFER_CAPACITY, file);

    let mut values = BTreeSet::new();
    let mut files = BTreeSet::new();
    let mut has_current = false;
    let mut has_history = false;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: Finding = match serde_json::from_str(&line) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping malformed stream entry");
                continue;
            }
        };
        if !usable_value(&entry.value) {
            continue;
        }
        values.insert(entry.value);
        if !entry.file.is_empty() {
            files.insert(entry.file);
        }
        if entry.commit == CURRENT_PSEUDO_COMMIT {
            has_current = true;
        } else if !entry.commit.is_empty() {
            has_history = true;
        }
    }

    let source = match (has_current, has_history) {
        (true, false) => ScanSource::Current,
        (false, true) => ScanSource::History,
        _ => ScanSource::Both,
    };

    Ok(LoadedSecrets {
        values: sort_longest_first(values),
        files,
        source,
    })
}

fn sort_longest_first(values: BTreeSet<String>) -> Vec<String> {
    let mut values: Vec<String> = values.into_iter().collect();
    values.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    values
}
