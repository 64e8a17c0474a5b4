use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::CliArgs;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Config {
    pub version: u32,
    pub base_dir: PathBuf,
    #[serde(default)]
    pub check: CheckConfig,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct CheckConfig {
    /// Number of repositories checked concurrently
    pub jobs: usize,
    pub fetch_timeout_secs: u64,
    pub backend: Backend,
}

/// Which implementation answers the git queries
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Libgit2,
    Cli,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            base_dir: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
            check: CheckConfig::default(),
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            fetch_timeout_secs: 60,
            backend: Backend::default(),
        }
    }
}

impl CheckConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

pub fn get_default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "rck")
        .context("Failed to determine project directories")?;

    Ok(proj_dirs.config_dir().join("rck.toml"))
}

impl Config {
    /// Load the config file, falling back to defaults when it doesn't exist
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p,
            None => get_default_config_path()?,
        };

        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn from_cli_and_file(cli_args: &CliArgs) -> Result<Self> {
        let mut config = Self::load(cli_args.config.clone())?;

        // CLI args override config file
        if let Some(root) = &cli_args.root {
            config.base_dir = root.clone();
        }
        if let Some(jobs) = cli_args.jobs {
            config.check.jobs = jobs.max(1);
        }
        if let Some(secs) = cli_args.fetch_timeout {
            config.check.fetch_timeout_secs = secs;
        }
        if let Some(backend) = cli_args.backend {
            config.check.backend = backend;
        }

        Ok(config)
    }
}
