//! Report analysis: statistics, rollups, and exports
//!
//! Streaming reports are folded back into the same secret index the
//! aggregator uses; aggregated reports are read directly. Both paths feed
//! the same rollup shape, from which the CSV exports and the plain-text
//! rendering are produced.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{Finding, ScanReport, SecretRecord};
use crate::infrastructure::aggregator::SecretIndex;
use crate::infrastructure::report::{read_report, ReportError};

/// Line buffer when reading streaming reports.
const LINE_BUFFER_CAPACITY: usize = 1024 * 1024;

const TOP_LIMIT: usize = 10;

/// Complete analysis of a scan report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub stats: Stats,
    pub secrets: Vec<AnalyzedSecret>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_entries: usize,
    pub unique_secrets: usize,
    pub unique_values: usize,
    pub top_authors: Vec<CountedStat>,
    pub top_files: Vec<CountedStat>,
    pub type_breakdown: Vec<CountedStat>,
}

/// A name with its occurrence count, ordered most frequent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountedStat {
    pub name: String,
    pub count: usize,
}

/// Per-secret rollup carrying the secret-level observation window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedSecret {
    pub file: String,
    pub key: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub change_count: usize,
    pub total_occurrences: usize,
    pub authors: Vec<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub history: Vec<ValueSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSummary {
    pub value: String,
    pub masked_value: String,
    pub occurrences: usize,
    pub authors: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Analyze a report file, dispatched on its extension: `.jsonl` folds raw
/// findings, anything else parses the aggregated JSON document.
pub fn analyze(path: &Path) -> Result<Analysis, AnalyzeError> {
    if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        analyze_stream(path)
    } else {
        Ok(analyze_report(&read_report(path)?))
    }
}

/// Analyze an aggregated report. Author/file/type counts are taken per
/// secret; the raw findings are no longer available at this granularity.
pub fn analyze_report(report: &ScanReport) -> Analysis {
    let mut authors: HashMap<String, usize> = HashMap::new();
    let mut files: HashMap<String, usize> = HashMap::new();
    let mut types: HashMap<String, usize> = HashMap::new();

    for secret in &report.secrets {
        *files.entry(secret.file.clone()).or_default() += 1;
        *types.entry(secret.secret_type.clone()).or_default() += 1;
        for author in &secret.authors {
            *authors.entry(author.clone()).or_default() += 1;
        }
    }

    let total_entries = report.secrets.iter().map(|s| s.total_occurrences).sum();
    let secrets: Vec<AnalyzedSecret> = report.secrets.iter().map(summarize_secret).collect();

    Analysis {
        stats: build_stats(total_entries, &secrets, authors, files, types),
        secrets,
    }
}

fn analyze_stream(path: &Path) -> Result<Analysis, AnalyzeError> {
    let file = File::open(path)?;
    let reader = BufReader::with_capacity(LINE_BUFFER_CAPACITY, file);

    let mut index = SecretIndex::new();
    let mut authors: HashMap<String, usize> = HashMap::new();
    let mut files: HashMap<String, usize> = HashMap::new();
    let mut types: HashMap<String, usize> = HashMap::new();
    let mut total_entries = 0;

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

        total_entries += 1;
        *authors.entry(entry.author.clone()).or_default() += 1;
        *files.entry(entry.file.clone()).or_default() += 1;
        *types.entry(entry.secret_type.clone()).or_default() += 1;
        index.record(&entry);
    }
    debug!(total_entries, "Folded stream entries");

    let secrets: Vec<AnalyzedSecret> = index
        .into_secrets()
        .iter()
        .map(summarize_secret)
        .collect();

    Ok(Analysis {
        stats: build_stats(total_entries, &secrets, authors, files, types),
        secrets,
    })
}

fn summarize_secret(secret: &SecretRecord) -> AnalyzedSecret {
    let first_seen = secret.history.iter().map(|h| h.first_seen).min();
    let last_seen = secret.history.iter().map(|h| h.last_seen).max();
    AnalyzedSecret {
        file: secret.file.clone(),
        key: secret.key.clone(),
        secret_type: secret.secret_type.clone(),
        change_count: secret.change_count,
        total_occurrences: secret.total_occurrences,
        authors: secret.authors.clone(),
        first_seen,
        last_seen,
        history: secret
            .history
            .iter()
            .map(|h| ValueSummary {
                value: h.value.clone(),
                masked_value: h.masked_value.clone(),
                occurrences: h.commits.len(),
                authors: h.authors.clone(),
                first_seen: h.first_seen,
                last_seen: h.last_seen,
            })
            .collect(),
    }
}

fn build_stats(
    total_entries: usize,
    secrets: &[AnalyzedSecret],
    authors: HashMap<String, usize>,
    files: HashMap<String, usize>,
    types: HashMap<String, usize>,
) -> Stats {
    Stats {
        total_entries,
        unique_secrets: secrets.len(),
        unique_values: secrets.iter().map(|s| s.change_count).sum(),
        top_authors: top_counts(authors, TOP_LIMIT),
        top_files: top_counts(files, TOP_LIMIT),
        type_breakdown: top_counts(types, usize::MAX),
    }
}

fn top_counts(map: HashMap<String, usize>, limit: usize) -> Vec<CountedStat> {
    let mut stats: Vec<CountedStat> = map
        .into_iter()
        .map(|(name, count)| CountedStat { name, count })
        .collect();
    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    stats.truncate(limit);
    stats
}

/// Export the per-secret rollups as a semicolon-delimited CSV with a UTF-8
/// BOM for spreadsheet compatibility.
pub fn export_csv(analysis: &Analysis, path: &Path) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all("\u{FEFF}".as_bytes())?;

    let header = [
        "File",
        "Key",
        "Type",
        "ChangeCount",
        "TotalOccurrences",
        "Authors",
        "AuthorCount",
        "FirstSeen",
        "LastSeen",
        "DaysActive",
        "Values",
    ];
    writeln!(file, "{}", header.join(";"))?;

    for secret in &analysis.secrets {
        let values: Vec<&str> = secret
            .history
            .iter()
            .map(|h| h.masked_value.as_str())
            .collect();
        let row = [
            escape_csv(&secret.file),
            escape_csv(&secret.key),
            escape_csv(&secret.secret_type),
            secret.change_count.to_string(),
            secret.total_occurrences.to_string(),
            escape_csv(&secret.authors.join(", ")),
            secret.authors.len().to_string(),
            format_day(secret.first_seen),
            format_day(secret.last_seen),
            days_active(secret.first_seen, secret.last_seen).to_string(),
            escape_csv(&values.join(" | ")),
        ];
        writeln!(file, "{}", row.join(";"))?;
    }
    Ok(())
}

/// Export summary statistics as a sectioned CSV next to the main export.
pub fn export_stats_csv(analysis: &Analysis, path: &Path) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all("\u{FEFF}".as_bytes())?;

    writeln!(file, "=== SUMMARY ===")?;
    writeln!(file, "Metric;Value")?;
    writeln!(file, "Total Entries;{}", analysis.stats.total_entries)?;
    writeln!(file, "Unique Secrets;{}", analysis.stats.unique_secrets)?;
    writeln!(file, "Unique Values;{}", analysis.stats.unique_values)?;
    writeln!(file)?;

    for (title, columns, stats) in [
        ("=== AUTHORS ===", "Author;Count", &analysis.stats.top_authors),
        ("=== FILES ===", "File;Count", &analysis.stats.top_files),
        ("=== SECRET TYPES ===", "Type;Count", &analysis.stats.type_breakdown),
    ] {
        writeln!(file, "{title}")?;
        writeln!(file, "{columns}")?;
        for stat in stats {
            writeln!(file, "{};{}", escape_csv(&stat.name), stat.count)?;
        }
        writeln!(file)?;
    }
    Ok(())
}

/// Render a plain-text summary: global statistics followed by the secrets
/// ordered by change frequency. Values are masked unless requested.
pub fn render_text(analysis: &Analysis, show_values: bool, max_secrets: usize) -> String {
    let mut out = String::new();
    let stats = &analysis.stats;

    let _ = writeln!(out, "Entries analyzed:  {}", stats.total_entries);
    let _ = writeln!(out, "Unique secrets:    {}", stats.unique_secrets);
    let _ = writeln!(out, "Distinct values:   {}", stats.unique_values);

    if !stats.top_authors.is_empty() {
        let _ = writeln!(out, "\nTop authors:");
        for stat in &stats.top_authors {
            let _ = writeln!(out, "  {:<30} {}", stat.name, stat.count);
        }
    }
    if !stats.top_files.is_empty() {
        let _ = writeln!(out, "\nTop files:");
        for stat in &stats.top_files {
            let _ = writeln!(out, "  {:<50} {}", stat.name, stat.count);
        }
    }
    if !stats.type_breakdown.is_empty() {
        let _ = writeln!(out, "\nSecret types:");
        for stat in &stats.type_breakdown {
            let _ = writeln!(out, "  {:<20} {}", stat.name, stat.count);
        }
    }

    let shown = if max_secrets > 0 && analysis.secrets.len() > max_secrets {
        &analysis.secrets[..max_secrets]
    } else {
        &analysis.secrets[..]
    };

    if !shown.is_empty() {
        let _ = writeln!(out, "\nSecrets by change frequency:");
    }
    for secret in shown {
        let _ = writeln!(
            out,
            "\n  {} :: {}\n    type: {}  changes: {}  occurrences: {}",
            secret.file, secret.key, secret.secret_type, secret.change_count, secret.total_occurrences
        );
        let _ = writeln!(out, "    authors: {}", secret.authors.join(", "));
        if let (Some(first), Some(last)) = (secret.first_seen, secret.last_seen) {
            let _ = writeln!(
                out,
                "    period: {} -> {}",
                first.format("%Y-%m-%d"),
                last.format("%Y-%m-%d")
            );
        }
        for value in &secret.history {
            let shown_value = if show_values {
                value.value.as_str()
            } else {
                value.masked_value.as_str()
            };
            let _ = writeln!(
                out,
                "      - {} ({}x by {})",
                shown_value,
                value.occurrences,
                value.authors.join(", ")
            );
        }
    }

    if max_secrets > 0 && analysis.secrets.len() > max_secrets {
        let _ = writeln!(
            out,
            "\n... and {} more secrets",
            analysis.secrets.len() - max_secrets
        );
    }
    out
}

/// CSV escaping for the semicolon-delimited exports: separators are
/// replaced, then the field is quoted when it contains `,` or `"`.
fn escape_csv(field: &str) -> String {
    let cleaned = field
        .replace(';', ",")
        .replace('\n', " ")
        .replace('\r', " ");
    if cleaned.contains(',') || cleaned.contains('"') {
        format!("\"{}\"", cleaned.replace('"', "\"\""))
    } else {
        cleaned
    }
}

fn format_day(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn days_active(first: Option<DateTime<Utc>>, last: Option<DateTime<Utc>>) -> i64 {
    match (first, last) {
        (Some(first), Some(last)) => (last - first).num_days(),
        _ => 0,
    }
}
