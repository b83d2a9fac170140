//! Clean use case: load secrets from a report and redact them
//!
//! The source and the set of affected files default to what the report
//! itself says; an explicit source overrides the detection.

use std::path::PathBuf;

use tracing::info;

use crate::domain::ScanSource;
use crate::infrastructure::report::{self, ReportError};
use crate::infrastructure::rewrite::{
    CleanOptions, CleanOutcome, Redactor, RewriteError, RewriteTool,
};

#[derive(Debug, Clone)]
pub struct CleanRequest {
    /// Report file to take secret values from (`.json` or `.jsonl`).
    pub input: PathBuf,
    pub repo: PathBuf,
    pub tool: RewriteTool,
    /// Overrides the source detected from the report.
    pub source: Option<ScanSource>,
    pub dry_run: bool,
    pub force: bool,
    pub no_backup: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

pub async fn execute(request: CleanRequest) -> Result<CleanOutcome, CleanError> {
    let loaded = report::load_secrets(&request.input)?;
    let source = request.source.unwrap_or(loaded.source);
    info!(
        values = loaded.values.len(),
        files = loaded.files.len(),
        source = %source,
        "Loaded secrets for redaction"
    );

    let options = CleanOptions {
        tool: request.tool,
        source,
        affected_files: loaded.files,
        dry_run: request.dry_run,
        force: request.force,
        no_backup: request.no_backup,
    };

    let outcome = Redactor::new(&request.repo)
        .clean(&loaded.values, options)
        .await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detected_source_drives_the_plan() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.jsonl");
        std::fs::write(
            &input,
            r#"{"file":"app.env","key":"password","value":"super-secret-value","maskedValue":"su**************ue","type":"password","commit":"current","author":"current","date":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("app.env"), "password=super-secret-value\n").unwrap();

        let outcome = execute(CleanRequest {
            input,
            repo: dir.path().to_path_buf(),
            tool: RewriteTool::FilterBranch,
            source: None,
            dry_run: true,
            force: false,
            no_backup: true,
        })
        .await
        .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.source, ScanSource::Current);
        assert_eq!(outcome.secrets_removed, 1);
    }
}
