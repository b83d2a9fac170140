//! History rewriting and working-tree redaction
//!
//! Delegates the actual history rewrite to an external tool, preferring
//! git-filter-repo, then BFG, then the built-in filter-branch fallback.
//! Values are batched longest-first into alternation regexes so that no
//! value is clobbered by a shorter prefix of another. A backup reference to
//! the pre-rewrite HEAD is created before history is touched and is never
//! deleted here.

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::{mask_secret, ScanSource, REDACTED_MARKER};

/// Maximum number of values folded into one alternation regex.
pub const BATCH_SIZE: usize = 100;

/// Working-tree files larger than this are never rewritten in place.
const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// How many masked values a dry run previews.
const PREVIEW_LIMIT: usize = 10;

/// External rewriter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewriteTool {
    /// First available of filter-repo, BFG, filter-branch.
    #[default]
    Auto,
    FilterRepo,
    Bfg,
    FilterBranch,
}

impl fmt::Display for RewriteTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RewriteTool::Auto => "auto",
            RewriteTool::FilterRepo => "filter-repo",
            RewriteTool::Bfg => "bfg",
            RewriteTool::FilterBranch => "filter-branch",
        };
        f.write_str(s)
    }
}

/// Options for one redaction run.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub tool: RewriteTool,
    pub source: ScanSource,
    /// Working-tree phase only touches these repository-relative paths.
    pub affected_files: BTreeSet<String>,
    pub dry_run: bool,
    pub force: bool,
    pub no_backup: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            tool: RewriteTool::Auto,
            source: ScanSource::Both,
            affected_files: BTreeSet::new(),
            dry_run: false,
            force: false,
            no_backup: false,
        }
    }
}

/// Result envelope of a redaction run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanOutcome {
    pub tool: String,
    pub source: ScanSource,
    pub secrets_removed: usize,
    pub patterns_used: usize,
    pub files_modified: usize,
    pub backup_branch: Option<String>,
    pub success: bool,
    pub message: String,
    pub dry_run: bool,
    pub preview_secrets: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("failed to prepare replacements file: {0}")]
    Io(#[from] io::Error),

    #[error("{tool} failed: {detail}")]
    ToolFailed { tool: String, detail: String },
}

/// Sort values longest-first and partition them into alternation regexes of
/// meta-escaped literals, at most [`BATCH_SIZE`] values each, wrapped in a
/// single capturing group.
pub fn batch_patterns(values: &[String]) -> Vec<String> {
    let mut sorted: Vec<&String> = values.iter().collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    sorted
        .chunks(BATCH_SIZE)
        .map(|chunk| {
            let escaped: Vec<String> = chunk.iter().map(|v| regex::escape(v)).collect();
            format!("({})", escaped.join("|"))
        })
        .collect()
}

/// Redacts secret values from a repository's working tree and history.
pub struct Redactor {
    repo: PathBuf,
}

impl Redactor {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    /// Whether git-filter-repo is installed.
    pub async fn has_filter_repo() -> bool {
        probe("git", &["filter-repo", "--version"]).await
    }

    /// Whether BFG is installed, either on PATH or as a local jar.
    pub async fn has_bfg() -> bool {
        probe("bfg", &["--version"]).await || probe("java", &["-jar", "bfg.jar", "--version"]).await
    }

    async fn resolve_tool(requested: RewriteTool) -> RewriteTool {
        match requested {
            RewriteTool::Auto => {
                if Self::has_filter_repo().await {
                    RewriteTool::FilterRepo
                } else if Self::has_bfg().await {
                    RewriteTool::Bfg
                } else {
                    RewriteTool::FilterBranch
                }
            }
            concrete => concrete,
        }
    }

    /// Redact `values` from the repository according to `opts`.
    ///
    /// An empty value set is a success no-op. Failures of the external
    /// rewriter come back as `success = false` with the tool's stderr; the
    /// backup reference, once created, is left intact.
    pub async fn clean(
        &self,
        values: &[String],
        opts: CleanOptions,
    ) -> Result<CleanOutcome, RewriteError> {
        if values.is_empty() {
            return Ok(CleanOutcome {
                tool: String::new(),
                source: opts.source,
                secrets_removed: 0,
                patterns_used: 0,
                files_modified: 0,
                backup_branch: None,
                success: true,
                message: "No secrets to redact".to_string(),
                dry_run: opts.dry_run,
                preview_secrets: Vec::new(),
            });
        }

        let tool = Self::resolve_tool(opts.tool).await;
        let patterns = batch_patterns(values);

        if opts.dry_run {
            let preview: Vec<String> = values
                .iter()
                .take(PREVIEW_LIMIT)
                .map(|v| mask_secret(v))
                .collect();
            let message = match opts.source {
                ScanSource::Current => format!(
                    "[DRY-RUN] Would redact {} secrets in current files only",
                    values.len()
                ),
                ScanSource::History => format!(
                    "[DRY-RUN] Would redact {} secrets in git history using {}",
                    values.len(),
                    tool
                ),
                ScanSource::Both => format!(
                    "[DRY-RUN] Would redact {} secrets in current files + git history using {}",
                    values.len(),
                    tool
                ),
            };
            return Ok(CleanOutcome {
                tool: tool.to_string(),
                source: opts.source,
                secrets_removed: values.len(),
                patterns_used: patterns.len(),
                files_modified: 0,
                backup_branch: None,
                success: true,
                message,
                dry_run: true,
                preview_secrets: preview,
            });
        }

        let mut backup_branch = None;
        if !opts.no_backup && opts.source.includes_history() {
            backup_branch = self.create_backup().await;
        }

        let mut files_modified = 0;
        if opts.source.includes_worktree() {
            files_modified = self.clean_worktree(values, &opts.affected_files);
            info!(files_modified, "Working-tree redaction finished");
        }

        if opts.source.includes_history() {
            info!(tool = %tool, patterns = patterns.len(), "Rewriting history");
            let result = match tool {
                RewriteTool::FilterRepo => self.run_filter_repo(&patterns, opts.force).await,
                RewriteTool::Bfg => self.run_bfg(values).await,
                _ => self.run_filter_branch(&patterns).await,
            };

            match result {
                Ok(()) => self.compact().await,
                Err(RewriteError::ToolFailed { tool: name, detail }) => {
                    return Ok(CleanOutcome {
                        tool: tool.to_string(),
                        source: opts.source,
                        secrets_removed: values.len(),
                        patterns_used: patterns.len(),
                        files_modified,
                        backup_branch,
                        success: false,
                        message: format!("{name} failed: {detail}"),
                        dry_run: false,
                        preview_secrets: Vec::new(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let message = match opts.source {
            ScanSource::Current => format!(
                "Redacted {} secrets in {} files (current files only)",
                values.len(),
                files_modified
            ),
            ScanSource::History => format!(
                "Redacted {} secrets in git history using {}",
                values.len(),
                tool
            ),
            ScanSource::Both => format!(
                "Redacted {} secrets in {} files + git history using {}",
                values.len(),
                files_modified,
                tool
            ),
        };

        Ok(CleanOutcome {
            tool: tool.to_string(),
            source: opts.source,
            secrets_removed: values.len(),
            patterns_used: patterns.len(),
            files_modified,
            backup_branch,
            success: true,
            message,
            dry_run: false,
            preview_secrets: Vec::new(),
        })
    }

    async fn create_backup(&self) -> Option<String> {
        let name = format!("backup-before-clean-{}", std::process::id());
        let status = Command::new("git")
            .args(["branch", name.as_str()])
            .current_dir(&self.repo)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(s) if s.success() => {
                info!(branch = %name, "Created backup branch");
                Some(name)
            }
            _ => {
                warn!(branch = %name, "Failed to create backup branch");
                None
            }
        }
    }

    /// Replace every literal occurrence of each value in the affected
    /// working-tree files. Values are expected longest-first so shorter
    /// values never clip longer ones.
    fn clean_worktree(&self, values: &[String], allowed: &BTreeSet<String>) -> usize {
        let mut modified = 0;

        for rel_path in allowed {
            let full = self.repo.join(rel_path);
            let meta = match std::fs::metadata(&full) {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            if meta.is_dir() || meta.len() > MAX_FILE_SIZE {
                continue;
            }

            let bytes = match std::fs::read(&full) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(file = %rel_path, error = %e, "Failed to read file for redaction");
                    continue;
                }
            };
            let mut content = String::from_utf8_lossy(&bytes).into_owned();

            let mut changed = false;
            for value in values {
                if content.contains(value.as_str()) {
                    content = content.replace(value.as_str(), REDACTED_MARKER);
                    changed = true;
                }
            }
            if !changed {
                continue;
            }

            if let Err(e) = std::fs::write(&full, &content) {
                warn!(file = %rel_path, error = %e, "Failed to write redacted file");
                continue;
            }
            if let Err(e) = std::fs::set_permissions(&full, meta.permissions()) {
                warn!(file = %rel_path, error = %e, "Failed to restore file mode");
            }
            modified += 1;
        }

        modified
    }

    async fn run_filter_repo(&self, patterns: &[String], force: bool) -> Result<(), RewriteError> {
        let mut replacements = tempfile::NamedTempFile::new()?;
        for pattern in patterns {
            writeln!(replacements, "regex:{pattern}==>{REDACTED_MARKER}")?;
        }
        replacements.flush()?;

        let replacements_path = replacements.path().display().to_string();
        let mut args = vec!["filter-repo", "--replace-text", replacements_path.as_str()];
        if force {
            args.push("--force");
        }

        run_tool("git-filter-repo", Command::new("git").args(&args).current_dir(&self.repo)).await
    }

    async fn run_bfg(&self, values: &[String]) -> Result<(), RewriteError> {
        let mut replacements = tempfile::NamedTempFile::new()?;
        for value in values {
            writeln!(replacements, "{value}")?;
        }
        replacements.flush()?;

        let replacements_path = replacements.path().display().to_string();
        let repo = self.repo.display().to_string();

        let direct = Command::new("bfg")
            .args(["--replace-text", replacements_path.as_str(), repo.as_str()])
            .stdin(Stdio::null())
            .output()
            .await;

        match direct {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(tool_failure("bfg", &output)),
            // Not on PATH; try the conventional jar invocation.
            Err(_) => {
                run_tool(
                    "bfg",
                    Command::new("java").args([
                        "-jar",
                        "bfg.jar",
                        "--replace-text",
                        replacements_path.as_str(),
                        repo.as_str(),
                    ]),
                )
                .await
            }
        }
    }

    async fn run_filter_branch(&self, patterns: &[String]) -> Result<(), RewriteError> {
        let sed_script: Vec<String> = patterns
            .iter()
            .map(|p| format!("s/{p}/{REDACTED_MARKER}/g"))
            .collect();
        let filter = format!(
            "git ls-files -z | xargs -0 sed -i '' '{}' 2>/dev/null || true",
            sed_script.join("; ")
        );

        run_tool(
            "git-filter-branch",
            Command::new("git")
                .args(["filter-branch", "-f", "--tree-filter", filter.as_str(), "--", "--all"])
                // Skip the ten-second interactive deprecation pause.
                .env("FILTER_BRANCH_SQUELCH_WARNING", "1")
                .current_dir(&self.repo),
        )
        .await
    }

    /// Drop rewritten objects: expire all reflogs, then aggressive gc.
    /// Failures here are logged, not fatal; the rewrite already landed.
    async fn compact(&self) {
        for args in [
            vec!["reflog", "expire", "--expire=now", "--all"],
            vec!["gc", "--prune=now", "--aggressive"],
        ] {
            let status = Command::new("git")
                .args(&args)
                .current_dir(&self.repo)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match status {
                Ok(s) if s.success() => {}
                _ => warn!(command = ?args, "Repository compaction step failed"),
            }
        }
    }
}

async fn probe(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

async fn run_tool(name: &str, command: &mut Command) -> Result<(), RewriteError> {
    debug!(tool = name, "Invoking history rewriter");
    let output = command
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| RewriteError::ToolFailed {
            tool: name.to_string(),
            detail: e.to_string(),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(tool_failure(name, &output))
    }
}

fn tool_failure(name: &str, output: &std::process::Output) -> RewriteError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    RewriteError::ToolFailed {
        tool: name.to_string(),
        detail: if detail.is_empty() {
            format!("exit status {:?}", output.status.code())
        } else {
            detail.to_string()
        },
    }
}
