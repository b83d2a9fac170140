//! Clean command - redact secrets from the working tree and/or history

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::application::clean::{self, CleanRequest};
use crate::cli::{exit_codes, Cli, SourceArg, ToolArg};

/// Arguments for the clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Scan report to take secret values from (.json or .jsonl)
    pub input: PathBuf,

    /// Path to the repository to rewrite
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// History rewriter to use
    #[arg(long, value_enum, default_value = "auto")]
    pub tool: ToolArg,

    /// Override the substrate detected from the report
    #[arg(long, value_enum)]
    pub source: Option<SourceArg>,

    /// Report the plan without modifying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Pass --force to the history rewriter
    #[arg(long)]
    pub force: bool,

    /// Skip creating the backup branch
    #[arg(long)]
    pub no_backup: bool,
}

pub async fn run(cli: &Cli, args: &CleanArgs) -> Result<i32> {
    if !args.input.exists() {
        eprintln!("error: input file does not exist: {}", args.input.display());
        return Ok(exit_codes::CONFIG_ERROR);
    }
    if !args.repo.join(".git").exists() {
        eprintln!("error: not a git repository: {}", args.repo.display());
        return Ok(exit_codes::CONFIG_ERROR);
    }

    let request = CleanRequest {
        input: args.input.clone(),
        repo: args.repo.clone(),
        tool: args.tool.into(),
        source: args.source.map(Into::into),
        dry_run: args.dry_run,
        force: args.force,
        no_backup: args.no_backup,
    };

    let outcome = match clean::execute(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: clean failed: {e}");
            return Ok(exit_codes::OPERATION_FAILED);
        }
    };

    if !cli.quiet {
        println!("{}", outcome.message);
        if !outcome.preview_secrets.is_empty() {
            println!("Preview:");
            for masked in &outcome.preview_secrets {
                println!("  {masked}");
            }
        }
        if let Some(branch) = &outcome.backup_branch {
            println!("Backup branch: {branch}");
        }
    }

    if outcome.success {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::OPERATION_FAILED)
    }
}
