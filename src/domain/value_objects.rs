//! Value objects shared across the scanning pipeline

use std::fmt;

use serde::{Deserialize, Serialize};

/// Commit id and author recorded for findings taken from the working tree
/// rather than from history.
pub const CURRENT_PSEUDO_COMMIT: &str = "current";

/// Replacement token written over secret values during redaction.
pub const REDACTED_MARKER: &str = "***REMOVED***";

/// Which substrate a report or redaction pertains to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    /// Working tree only.
    Current,
    /// Commit history only.
    History,
    /// Working tree and commit history.
    Both,
}

impl ScanSource {
    pub fn includes_worktree(self) -> bool {
        matches!(self, ScanSource::Current | ScanSource::Both)
    }

    pub fn includes_history(self) -> bool {
        matches!(self, ScanSource::History | ScanSource::Both)
    }
}

impl fmt::Display for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanSource::Current => "current",
            ScanSource::History => "history",
            ScanSource::Both => "both",
        };
        f.write_str(s)
    }
}

/// Mask a secret value for display and reports.
///
/// Values of four characters or fewer are fully masked; longer values keep
/// their first and last two characters around at most sixteen stars.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let stars = (chars.len() - 4).min(16);
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(stars), tail)
}
