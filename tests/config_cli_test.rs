use anyhow::Result;
use clap::Parser;
use rck::cli::CliArgs;
use rck::config::{Backend, Config, get_default_config_path};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

// CLI args -> config file -> effective settings
#[test]
fn test_config_and_cli_integration() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_file = temp_dir.path().join("rck.toml");

    let test_config = r#"
version = 1
base_dir = "/tmp/test/repos"

[check]
jobs = 4
fetch_timeout_secs = 15
backend = "cli"
"#;
    fs::write(&config_file, test_config)?;

    let config = Config::load(Some(config_file.clone()))?;
    assert_eq!(config.version, 1);
    assert_eq!(config.base_dir, PathBuf::from("/tmp/test/repos"));
    assert_eq!(config.check.jobs, 4);
    assert_eq!(config.check.fetch_timeout(), Duration::from_secs(15));
    assert_eq!(config.check.backend, Backend::Cli);

    // Only the flags given on the command line override the file
    let config_arg = config_file.to_string_lossy().to_string();
    let cli_args = CliArgs::parse_from([
        "rck",
        "/override/path",
        "--config",
        &config_arg,
        "--fetch-timeout",
        "3",
    ]);
    let final_config = Config::from_cli_and_file(&cli_args)?;
    assert_eq!(final_config.base_dir, PathBuf::from("/override/path"));
    assert_eq!(final_config.check.fetch_timeout_secs, 3);
    assert_eq!(final_config.check.jobs, 4);
    assert_eq!(final_config.check.backend, Backend::Cli);

    // No root argument keeps the configured base_dir
    let cli_args = CliArgs::parse_from(["rck", "--config", &config_arg]);
    let final_config = Config::from_cli_and_file(&cli_args)?;
    assert_eq!(final_config.base_dir, PathBuf::from("/tmp/test/repos"));

    Ok(())
}

#[test]
fn test_config_path_resolution() -> Result<()> {
    let config_path = get_default_config_path()?;
    let path_str = config_path.to_string_lossy();
    assert!(path_str.contains("rck") && path_str.ends_with("rck.toml"));
    Ok(())
}

#[test]
fn test_unknown_backend_is_rejected() {
    let result = CliArgs::try_parse_from(["rck", "--backend", "svn"]);
    assert!(result.is_err());
}
