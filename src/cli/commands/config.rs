//! Config command - show or initialize the pattern configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::{exit_codes, Cli};
use crate::config::Config;

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Write a starter patterns.json with the built-in defaults
    #[arg(long)]
    pub init: bool,

    /// Target path for --init
    #[arg(long, default_value = "patterns.json")]
    pub path: PathBuf,

    /// Pattern configuration file to show (auto-detected when omitted)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub async fn run(cli: &Cli, args: &ConfigArgs) -> Result<i32> {
    if args.init {
        if args.path.exists() {
            eprintln!(
                "error: refusing to overwrite existing file: {}",
                args.path.display()
            );
            return Ok(exit_codes::CONFIG_ERROR);
        }
        Config::default().save(&args.path)?;
        if !cli.quiet {
            println!("Configuration written: {}", args.path.display());
        }
        return Ok(exit_codes::SUCCESS);
    }

    let config = match Config::load_or_auto(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(exit_codes::SUCCESS)
}
