//! State machine over `git log --pretty=format:… -p` output
//!
//! The log stream interleaves commit header lines (marked with a sentinel
//! distinctive enough not to collide with file content), `diff --git`
//! boundaries, and patch hunks. The walker tracks the current commit and
//! file and surfaces added content lines; everything else is positional
//! noise.

/// Sentinel prefix of a commit header line: `COMMIT_START|<hash>|<author>|<date>`.
pub const COMMIT_SENTINEL: &str = "COMMIT_START|";

/// Commit metadata parsed from a sentinel line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitHeader {
    pub hash: String,
    pub author: String,
    /// RFC 3339 author date as emitted by `%aI`.
    pub date: String,
}

/// Parse a sentinel commit header line.
pub fn parse_commit_header(line: &str) -> Option<CommitHeader> {
    let rest = line.strip_prefix(COMMIT_SENTINEL)?;
    let mut parts = rest.splitn(3, '|');
    let hash = parts.next()?;
    let author = parts.next()?;
    let date = parts.next()?;
    Some(CommitHeader {
        hash: hash.to_string(),
        author: author.to_string(),
        date: date.to_string(),
    })
}

/// Extract the post-image path from a `diff --git a/… b/…` line.
pub fn parse_diff_target(line: &str) -> Option<&str> {
    if !line.starts_with("diff --git") {
        return None;
    }
    line.find(" b/").map(|idx| &line[idx + 3..])
}

/// Streaming walker over diff output lines.
///
/// Files rejected by the filter are blanked so their added lines are
/// skipped until the next `diff --git` boundary.
pub struct DiffWalker<F> {
    ignore_file: F,
    commit: Option<CommitHeader>,
    file: String,
}

impl<F: Fn(&str) -> bool> DiffWalker<F> {
    pub fn new(ignore_file: F) -> Self {
        Self {
            ignore_file,
            commit: None,
            file: String::new(),
        }
    }

    /// Feed one line. Returns the commit, file, and content for candidate
    /// added lines (`+` but not `+++`, inside a known commit and a
    /// non-ignored file); `None` for every other line.
    pub fn observe<'w, 'l>(&'w mut self, line: &'l str) -> Option<(&'w CommitHeader, &'w str, &'l str)> {
        if let Some(header) = parse_commit_header(line) {
            self.commit = Some(header);
            self.file.clear();
            return None;
        }

        if line.starts_with("diff --git") {
            if let Some(target) = parse_diff_target(line) {
                self.file = if (self.ignore_file)(target) {
                    String::new()
                } else {
                    target.to_string()
                };
            }
            return None;
        }

        if line.starts_with('+') && !line.starts_with("+++") && !self.file.is_empty() {
            if let Some(commit) = self.commit.as_ref() {
                return Some((commit, &self.file, &line[1..]));
            }
        }
        None
    }
}
