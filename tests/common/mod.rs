//! Test fixtures: throwaway git repositories

// Each integration test crate compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// A git repository in a temporary directory, torn down on drop.
pub struct GitRepo {
    _dir: TempDir,
    pub path: PathBuf,
}

impl GitRepo {
    /// Initialize an empty repository with a fixed identity.
    pub fn init() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().to_path_buf();

        run(&path, &["init", "-q"]);
        run(&path, &["config", "user.name", "Test Author"]);
        run(&path, &["config", "user.email", "test@example.invalid"]);

        Self { _dir: dir, path }
    }

    /// Write a file and commit it with the given author name and date.
    pub fn commit_file(&self, file: &str, content: &str, author: &str, date: &str) {
        let full = self.path.join(file);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&full, content).expect("write file");

        run(&self.path, &["add", "."]);
        let status = Command::new("git")
            .args(["commit", "-q", "-m", "update", "--author"])
            .arg(format!("{author} <{}@example.invalid>", author.to_lowercase()))
            .env("GIT_AUTHOR_DATE", date)
            .env("GIT_COMMITTER_DATE", date)
            .current_dir(&self.path)
            .status()
            .expect("run git commit");
        assert!(status.success(), "git commit failed");
    }

    /// Capture `git <args>` stdout in this repository.
    pub fn git_stdout(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .expect("run git");
        String::from_utf8_lossy(&output.stdout).into_owned()
    }
}

fn run(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("run git");
    assert!(status.success(), "git {args:?} failed");
}

/// Whether git is available on this machine; tests that need a real
/// repository bail out early when it is not.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
