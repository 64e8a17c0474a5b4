use crate::config::Backend;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "rck")]
#[command(about = "Repository check - list Git repositories that are not up to date with their remotes")]
pub struct CliArgs {
    /// Directory to scan for repositories (overrides config)
    pub root: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of repositories to check concurrently
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Seconds a fetch may take before the repository is reported as failed
    #[arg(long, value_name = "SECS")]
    pub fetch_timeout: Option<u64>,

    /// Git implementation used for the queries
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Print why each repository is stale; repeat for more log output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Don't print the error block when there are no errors
    #[arg(long)]
    pub quiet_errors: bool,

    /// Exit with status 2 if any repository is stale or failed
    #[arg(long)]
    pub strict: bool,
}

impl CliArgs {
    /// Log filter used when RUST_LOG is not set
    pub fn default_log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
