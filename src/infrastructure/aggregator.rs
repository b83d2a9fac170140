//! Deduplicating aggregation of raw findings into secret records
//!
//! The index is keyed by `(file, key)`; each entry tracks the distinct
//! values seen for that key together with their commits, authors, and
//! first/last observation times. Finalization produces the report ordering:
//! history ascending by first appearance, secrets descending by how often
//! their value changed.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::domain::{mask_secret, Finding, ScanReport, SecretRecord, ValueRecord, CURRENT_PSEUDO_COMMIT};
use crate::infrastructure::FindingSink;

#[derive(Debug, Default)]
pub struct SecretIndex {
    entries: HashMap<(String, String), SecretEntry>,
}

#[derive(Debug)]
struct SecretEntry {
    file: String,
    key: String,
    secret_type: String,
    authors: BTreeSet<String>,
    values: HashMap<String, ValueEntry>,
}

#[derive(Debug)]
struct ValueEntry {
    commits: Vec<String>,
    authors: BTreeSet<String>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl SecretIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold one raw finding into the index.
    pub fn record(&mut self, finding: &Finding) {
        let seen_at = parse_timestamp(&finding.date);
        let entry = self
            .entries
            .entry((finding.file.clone(), finding.key.clone()))
            .or_insert_with(|| SecretEntry {
                file: finding.file.clone(),
                key: finding.key.clone(),
                secret_type: finding.secret_type.clone(),
                authors: BTreeSet::new(),
                values: HashMap::new(),
            });

        entry.authors.insert(finding.author.clone());

        if let Some(value) = entry.values.get_mut(&finding.value) {
            // Working-tree findings carry a synthetic pseudo-commit; a
            // repeat of the same value is the same occurrence, not a new
            // one.
            if finding.commit == CURRENT_PSEUDO_COMMIT
                && value.commits.iter().any(|c| c == CURRENT_PSEUDO_COMMIT)
            {
                return;
            }
            value.commits.push(finding.commit.clone());
            value.authors.insert(finding.author.clone());
            value.first_seen = value.first_seen.min(seen_at);
            value.last_seen = value.last_seen.max(seen_at);
        } else {
            entry.values.insert(
                finding.value.clone(),
                ValueEntry {
                    commits: vec![finding.commit.clone()],
                    authors: BTreeSet::from([finding.author.clone()]),
                    first_seen: seen_at,
                    last_seen: seen_at,
                },
            );
        }
    }

    /// Materialize the report ordering: value history ascending by first
    /// appearance, secrets descending by change count (ties broken by
    /// identity for a stable order).
    pub fn into_secrets(self) -> Vec<SecretRecord> {
        let mut secrets: Vec<SecretRecord> = self
            .entries
            .into_values()
            .map(|entry| {
                let mut history: Vec<ValueRecord> = entry
                    .values
                    .into_iter()
                    .map(|(value, data)| ValueRecord {
                        masked_value: mask_secret(&value),
                        value,
                        commits: data.commits,
                        authors: data.authors.into_iter().collect(),
                        first_seen: data.first_seen,
                        last_seen: data.last_seen,
                    })
                    .collect();
                history.sort_by(|a, b| {
                    a.first_seen
                        .cmp(&b.first_seen)
                        .then_with(|| a.value.cmp(&b.value))
                });

                let total_occurrences = history.iter().map(|h| h.commits.len()).sum();
                SecretRecord {
                    change_count: history.len(),
                    total_occurrences,
                    file: entry.file,
                    key: entry.key,
                    secret_type: entry.secret_type,
                    authors: entry.authors.into_iter().collect(),
                    history,
                }
            })
            .collect();

        secrets.sort_by(|a, b| {
            Reverse(a.change_count)
                .cmp(&Reverse(b.change_count))
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.key.cmp(&b.key))
        });
        secrets
    }

    /// Build the final aggregated report.
    pub fn into_report(self, repository: String, branch: String) -> ScanReport {
        let secrets = self.into_secrets();
        let total_values = secrets.iter().map(|s| s.change_count).sum();
        ScanReport {
            repository,
            branch,
            secrets_found: secrets.len(),
            total_values,
            secrets,
            scan_date: Utc::now(),
        }
    }
}

/// Parse an RFC 3339 author date; unparseable input orders earliest.
pub fn parse_timestamp(date: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(date)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Sink folding findings into an in-memory index, shared across keyword
/// tasks. The lock is held only for the map update.
#[derive(Default)]
pub struct IndexSink {
    index: Mutex<SecretIndex>,
}

impl IndexSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the accumulated index, leaving an empty one behind.
    pub fn take_index(&self) -> SecretIndex {
        let mut guard = self.index.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *guard)
    }
}

impl FindingSink for IndexSink {
    fn record(&self, finding: Finding) {
        let mut guard = self.index.lock().unwrap_or_else(|e| e.into_inner());
        guard.record(&finding);
    }
}
