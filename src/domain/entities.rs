//! Report entities shared by the scanners, the aggregator and the analyzer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single raw finding, prior to aggregation.
///
/// This is also the wire format of one line in a streaming `.jsonl` report:
/// the `type` field carries the keyword that triggered the match, and
/// `commit`/`author` hold the literal `current` for working-tree findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub file: String,
    pub key: String,
    pub value: String,
    pub masked_value: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub commit: String,
    pub author: String,
    /// RFC 3339 author date as emitted by `%aI`, or the scan time for
    /// working-tree findings.
    pub date: String,
}

/// One distinct value a secret has held, with every commit it appeared in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRecord {
    pub value: String,
    pub masked_value: String,
    pub commits: Vec<String>,
    pub authors: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Deduplicated rollup of all findings sharing a `(file, key)` identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRecord {
    pub file: String,
    pub key: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub change_count: usize,
    pub total_occurrences: usize,
    pub authors: Vec<String>,
    /// Ordered by `first_seen` ascending.
    pub history: Vec<ValueRecord>,
}

/// Aggregated scan report, persisted as a single JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub repository: String,
    pub branch: String,
    pub secrets_found: usize,
    pub total_values: usize,
    /// Ordered by `change_count` descending.
    pub secrets: Vec<SecretRecord>,
    pub scan_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_serializes_with_wire_names() {
        let finding = Finding {
            file: "config/app.env".to_string(),
            key: "db_password".to_string(),
            value: "s3cret!".to_string(),
            masked_value: "s3***t!".to_string(),
            secret_type: "password".to_string(),
            commit: "abc123".to_string(),
            author: "alice".to_string(),
            date: "2024-03-01T12:00:00+01:00".to_string(),
        };

        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["type"], "password");
        assert_eq!(json["maskedValue"], "s3***t!");
        assert!(json.get("secret_type").is_none());
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = ScanReport {
            repository: "/tmp/repo".to_string(),
            branch: "--all".to_string(),
            secrets_found: 1,
            total_values: 1,
            secrets: vec![SecretRecord {
                file: "config".to_string(),
                key: "token".to_string(),
                secret_type: "token".to_string(),
                change_count: 1,
                total_occurrences: 2,
                authors: vec!["alice".to_string()],
                history: vec![ValueRecord {
                    value: "tok_abcdef123456".to_string(),
                    masked_value: "to************56".to_string(),
                    commits: vec!["abc".to_string(), "def".to_string()],
                    authors: vec!["alice".to_string()],
                    first_seen: Utc::now(),
                    last_seen: Utc::now(),
                }],
            }],
            scan_date: Utc::now(),
        };

        let json = serde_json::to_string(&report).unwrap();
        let back: ScanReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
