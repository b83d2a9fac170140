//! Scan command - search a repository for embedded credentials

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::application::{ScanOptions, ScanSummary, ScanUseCase};
use crate::cli::{exit_codes, Cli, ModeArg, SourceArg};
use crate::config::Config;

/// Arguments for the scan command
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Path to the repository (defaults to current directory)
    #[arg(default_value = ".")]
    pub repo: PathBuf,

    /// How results are collected
    #[arg(long, value_enum, default_value = "full")]
    pub mode: ModeArg,

    /// Which substrate to scan
    #[arg(long, value_enum, default_value = "history")]
    pub source: SourceArg,

    /// Revision selector passed to the history search (defaults to --all)
    #[arg(long)]
    pub branch: Option<String>,

    /// Report output path (extension is normalized per mode)
    #[arg(short, long, default_value = "secrets-report.json")]
    pub output: PathBuf,

    /// Pattern configuration file (auto-detected when omitted)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of keywords searched concurrently
    #[arg(long, default_value_t = 4)]
    pub jobs: usize,

    /// Exit non-zero when any secret is found
    #[arg(long)]
    pub fail_on_secrets: bool,
}

pub async fn run(cli: &Cli, args: &ScanArgs) -> Result<i32> {
    if !args.repo.exists() {
        eprintln!("error: repository path does not exist: {}", args.repo.display());
        return Ok(exit_codes::CONFIG_ERROR);
    }

    let config = match Config::load_or_auto(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let use_case = ScanUseCase::new(config);
    let options = ScanOptions {
        mode: args.mode.into(),
        source: args.source.into(),
        branch: args.branch.clone(),
        output: args.output.clone(),
        jobs: args.jobs,
    };

    let summary = match use_case.execute(&args.repo, options).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("error: scan failed: {e}");
            return Ok(exit_codes::OPERATION_FAILED);
        }
    };

    if !cli.quiet {
        match &summary {
            ScanSummary::Aggregated {
                output,
                secrets_found,
                total_values,
            } => {
                println!("Secrets found:   {secrets_found}");
                println!("Distinct values: {total_values}");
                println!("Report written:  {}", output.display());
            }
            ScanSummary::Streamed { output, entries } => {
                println!("Entries written: {entries}");
                println!("Stream written:  {}", output.display());
            }
        }
    }

    if args.fail_on_secrets && summary.found() > 0 {
        return Ok(exit_codes::SECRETS_FOUND);
    }
    Ok(exit_codes::SUCCESS)
}
