//! Command-line interface
//!
//! A thin, non-interactive layer over the core: typed arguments per
//! subcommand, exit codes suitable for CI, and plain output. All policy
//! lives in the application and infrastructure layers.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::ScanSource;
use crate::infrastructure::rewrite::RewriteTool;

/// git-secret-scanner - find and redact credentials in git repositories
#[derive(Parser, Debug)]
#[command(
    name = "gitsecret",
    version,
    about = "Scan git history and working tree for embedded credentials",
    long_about = "Scans a git repository for embedded credentials (passwords, API keys, \
                  tokens, connection strings) across the working tree and the full commit \
                  history, writes aggregated or streaming reports, analyzes them, and can \
                  rewrite history to redact the values."
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a repository for secrets
    #[command(visible_alias = "s")]
    Scan(commands::scan::ScanArgs),

    /// Analyze a scan report and export statistics
    #[command(visible_alias = "a")]
    Analyze(commands::analyze::AnalyzeArgs),

    /// Redact secrets from the working tree and/or history
    #[command(visible_alias = "c")]
    Clean(commands::clean::CleanArgs),

    /// Show or initialize the pattern configuration
    #[command(visible_alias = "cfg")]
    Config(commands::config::ConfigArgs),
}

/// Scan collection mode.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModeArg {
    /// Aggregate in memory, one JSON report
    #[default]
    Full,
    /// Append raw findings to JSONL, bounded memory
    Stream,
    /// Working tree only, aggregated
    Fast,
}

impl From<ModeArg> for crate::application::ScanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => Self::Full,
            ModeArg::Stream => Self::Stream,
            ModeArg::Fast => Self::Fast,
        }
    }
}

/// Which substrate to scan or redact.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceArg {
    /// Working tree only
    Current,
    /// Commit history only
    History,
    /// Working tree and commit history
    Both,
}

impl From<SourceArg> for ScanSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Current => Self::Current,
            SourceArg::History => Self::History,
            SourceArg::Both => Self::Both,
        }
    }
}

/// History rewriter selection.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToolArg {
    /// First available of filter-repo, bfg, filter-branch
    #[default]
    Auto,
    FilterRepo,
    Bfg,
    FilterBranch,
}

impl From<ToolArg> for RewriteTool {
    fn from(tool: ToolArg) -> Self {
        match tool {
            ToolArg::Auto => Self::Auto,
            ToolArg::FilterRepo => Self::FilterRepo,
            ToolArg::Bfg => Self::Bfg,
            ToolArg::FilterBranch => Self::FilterBranch,
        }
    }
}

/// Exit codes for CI integration.
pub mod exit_codes {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// Scan completed and secrets were found (with --fail-on-secrets)
    pub const SECRETS_FOUND: i32 = 1;
    /// Configuration or input error
    pub const CONFIG_ERROR: i32 = 2;
    /// Scan, analysis, or redaction failed
    pub const OPERATION_FAILED: i32 = 3;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = 99;
}

/// CLI application runner.
pub struct CliApp {
    cli: Cli,
}

impl CliApp {
    /// Parse arguments from the process environment.
    pub fn new() -> Self {
        Self { cli: Cli::parse() }
    }

    /// Run the selected command and return the process exit code.
    pub async fn run(self) -> anyhow::Result<i32> {
        crate::logging::init_tracing(self.cli.verbose, self.cli.quiet);

        match &self.cli.command {
            Commands::Scan(args) => commands::scan::run(&self.cli, args).await,
            Commands::Analyze(args) => commands::analyze::run(&self.cli, args).await,
            Commands::Clean(args) => commands::clean::run(&self.cli, args).await,
            Commands::Config(args) => commands::config::run(&self.cli, args).await,
        }
    }
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}
