//! git-secret-scanner - find and redact credentials in git repositories
//!
//! This crate scans a git repository for embedded credentials (passwords,
//! API keys, tokens, connection strings) across the working tree and the
//! full commit history, aggregates findings into structured reports, and
//! can rewrite history to redact the values.
//!
//! ## Features
//!
//! - Pickaxe-driven history traversal, one `git log -S` search per keyword
//! - Configurable key-value extraction patterns with false-positive
//!   suppression
//! - Deduplicating aggregation into per-`(file, key)` secret records
//! - Streaming JSONL output with bounded memory for large repositories
//! - Report analysis with CSV exports
//! - History redaction via git-filter-repo, BFG, or the filter-branch
//!   fallback, with backup-branch safety
//!
//! ## Usage
//!
//! ```no_run
//! use git_secret_scanner::application::{ScanOptions, ScanUseCase};
//! use git_secret_scanner::config::Config;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let use_case = ScanUseCase::new(Config::load_auto());
//! let summary = use_case
//!     .execute(std::path::Path::new("."), ScanOptions::default())
//!     .await?;
//! println!("report: {}", summary.output().display());
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::{Config, Extractor};
pub use domain::{Finding, ScanReport, ScanSource, SecretRecord, ValueRecord};
pub use logging::init_tracing;
