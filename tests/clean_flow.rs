//! End-to-end redaction tests

mod common;

use chrono::Utc;
use common::{git_available, GitRepo};
use git_secret_scanner::application::clean::{self, CleanRequest};
use git_secret_scanner::application::{ScanMode, ScanOptions, ScanSummary, ScanUseCase};
use git_secret_scanner::config::{Config, KeywordGroup};
use git_secret_scanner::domain::{ScanReport, ScanSource};
use git_secret_scanner::infrastructure::report;
use git_secret_scanner::infrastructure::rewrite::RewriteTool;

fn password_only_config() -> Config {
    let mut config = Config::default();
    config.keywords = vec![KeywordGroup {
        name: "password".to_string(),
        patterns: vec!["password".to_string()],
        description: String::new(),
    }];
    config
}

fn clean_request(input: std::path::PathBuf, repo: std::path::PathBuf) -> CleanRequest {
    CleanRequest {
        input,
        repo,
        tool: RewriteTool::FilterBranch,
        source: None,
        dry_run: false,
        force: false,
        no_backup: false,
    }
}

#[tokio::test]
async fn worktree_scan_then_clean_redacts_the_file() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }

    let repo = GitRepo::init();
    repo.commit_file(
        "app.env",
        "password=xK9m$pQ2wR#7vNjL\nusername=alice\n",
        "Alice",
        "2024-01-01T10:00:00+00:00",
    );

    let use_case = ScanUseCase::new(password_only_config());
    let summary = use_case
        .execute(
            &repo.path,
            ScanOptions {
                mode: ScanMode::Stream,
                source: ScanSource::Current,
                branch: None,
                output: repo.path.join("scan.jsonl"),
                jobs: 2,
            },
        )
        .await
        .unwrap();

    let ScanSummary::Streamed { output, entries } = summary else {
        panic!("expected streamed summary");
    };
    assert_eq!(entries, 1);

    let outcome = clean::execute(clean_request(output, repo.path.clone()))
        .await
        .unwrap();

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.source, ScanSource::Current);
    assert_eq!(outcome.secrets_removed, 1);
    assert_eq!(outcome.files_modified, 1);
    // Working-tree-only redaction never creates a backup branch.
    assert!(outcome.backup_branch.is_none());

    let content = std::fs::read_to_string(repo.path.join("app.env")).unwrap();
    assert_eq!(content, "password=***REMOVED***\nusername=alice\n");
}

#[tokio::test]
async fn history_clean_creates_a_backup_branch() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }

    let repo = GitRepo::init();
    repo.commit_file(
        "app.env",
        "password=xK9m$pQ2wR#7vNjL\n",
        "Alice",
        "2024-01-01T10:00:00+00:00",
    );

    let use_case = ScanUseCase::new(password_only_config());
    let summary = use_case
        .execute(
            &repo.path,
            ScanOptions {
                mode: ScanMode::Full,
                source: ScanSource::History,
                branch: None,
                output: repo.path.join("report.json"),
                jobs: 2,
            },
        )
        .await
        .unwrap();

    let outcome = clean::execute(clean_request(
        summary.output().to_path_buf(),
        repo.path.clone(),
    ))
    .await
    .unwrap();

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.source, ScanSource::History);

    let backup = outcome.backup_branch.expect("backup branch name");
    assert!(backup.starts_with("backup-before-clean-"));
    let branches = repo.git_stdout(&["branch", "--list", backup.as_str()]);
    assert!(branches.contains(&backup), "backup branch must exist");
}

#[tokio::test]
async fn dry_run_previews_and_modifies_nothing() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }

    let repo = GitRepo::init();
    repo.commit_file(
        "app.env",
        "password=xK9m$pQ2wR#7vNjL\n",
        "Alice",
        "2024-01-01T10:00:00+00:00",
    );

    let use_case = ScanUseCase::new(password_only_config());
    let summary = use_case
        .execute(
            &repo.path,
            ScanOptions {
                mode: ScanMode::Full,
                source: ScanSource::Both,
                branch: None,
                output: repo.path.join("report.json"),
                jobs: 2,
            },
        )
        .await
        .unwrap();

    let mut request = clean_request(summary.output().to_path_buf(), repo.path.clone());
    request.dry_run = true;
    let outcome = clean::execute(request).await.unwrap();

    assert!(outcome.success);
    assert!(outcome.dry_run);
    assert_eq!(outcome.secrets_removed, 1);
    assert_eq!(outcome.patterns_used, 1);
    assert_eq!(outcome.preview_secrets.len(), 1);
    // Masked preview only.
    assert!(!outcome.preview_secrets[0].contains("xK9m$pQ2wR#7vNjL"));
    assert!(outcome.backup_branch.is_none());

    let content = std::fs::read_to_string(repo.path.join("app.env")).unwrap();
    assert!(content.contains("xK9m$pQ2wR#7vNjL"));
}

#[tokio::test]
async fn empty_report_is_a_success_noop() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }

    let repo = GitRepo::init();
    repo.commit_file(
        "app.env",
        "nothing=here\n",
        "Alice",
        "2024-01-01T10:00:00+00:00",
    );

    let empty = ScanReport {
        repository: repo.path.display().to_string(),
        branch: "--all".to_string(),
        secrets_found: 0,
        total_values: 0,
        secrets: Vec::new(),
        scan_date: Utc::now(),
    };
    let input = report::write_report(&empty, &repo.path.join("empty.json")).unwrap();

    let outcome = clean::execute(clean_request(input, repo.path.clone()))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.secrets_removed, 0);
    assert_eq!(outcome.files_modified, 0);
    assert!(outcome.backup_branch.is_none());
    // Repository untouched.
    let content = std::fs::read_to_string(repo.path.join("app.env")).unwrap();
    assert_eq!(content, "nothing=here\n");
}
