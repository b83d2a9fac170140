//! Analyze command - statistics and exports over a scan report

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::application::analyze;
use crate::cli::{exit_codes, Cli};

/// Arguments for the analyze command
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Scan report to analyze (.json or .jsonl)
    pub input: PathBuf,

    /// Write the per-secret rollups as semicolon-delimited CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Write summary statistics as a sectioned CSV
    #[arg(long)]
    pub stats_csv: Option<PathBuf>,

    /// Print the analysis as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Show clear-text values instead of masked ones
    #[arg(long)]
    pub show_values: bool,

    /// Maximum number of secrets rendered (0 for all)
    #[arg(long, default_value_t = 20)]
    pub max_secrets: usize,
}

pub async fn run(cli: &Cli, args: &AnalyzeArgs) -> Result<i32> {
    if !args.input.exists() {
        eprintln!("error: input file does not exist: {}", args.input.display());
        return Ok(exit_codes::CONFIG_ERROR);
    }

    let analysis = match analyze::analyze(&args.input) {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("error: analysis failed: {e}");
            return Ok(exit_codes::OPERATION_FAILED);
        }
    };

    if let Some(csv) = &args.csv {
        analyze::export_csv(&analysis, csv)?;
        if !cli.quiet {
            println!("CSV written: {}", csv.display());
        }
    }
    if let Some(stats_csv) = &args.stats_csv {
        analyze::export_stats_csv(&analysis, stats_csv)?;
        if !cli.quiet {
            println!("Stats CSV written: {}", stats_csv.display());
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else if !cli.quiet {
        print!(
            "{}",
            analyze::render_text(&analysis, args.show_values, args.max_secrets)
        );
    }

    Ok(exit_codes::SUCCESS)
}
