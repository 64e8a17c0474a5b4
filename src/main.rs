use anyhow::{Result, bail};
use clap::Parser;
use rck::adapters::git::set_network_timeouts;
use rck::adapters::{GitCliBackend, Libgit2Backend};
use rck::cli::CliArgs;
use rck::config::{Backend, Config};
use rck::ports::GitPort;
use rck::report::{write_errors, write_stale};
use rck::scan::resolve_root;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn build_port(config: &Config) -> Result<Box<dyn GitPort>> {
    let timeout = config.check.fetch_timeout();
    match config.check.backend {
        Backend::Libgit2 => {
            set_network_timeouts(timeout)?;
            Ok(Box::new(Libgit2Backend::new(timeout)))
        }
        Backend::Cli => {
            let backend = GitCliBackend::new(timeout);
            if !backend.is_available() {
                bail!("the cli backend needs a `git` executable on PATH");
            }
            Ok(Box::new(backend))
        }
    }
}

fn execute(args: &CliArgs) -> Result<ExitCode> {
    let config = Config::from_cli_and_file(args)?;
    let root = resolve_root(&config.base_dir)?;
    let port = build_port(&config)?;

    info!(
        "Scanning {} ({:?} backend, {} job(s))",
        root.display(),
        config.check.backend,
        config.check.jobs
    );

    let verbose = args.verbose > 0;
    let stdout = io::stdout();
    let report = rck::run(&root, port.as_ref(), config.check.jobs, |entry| {
        let mut out = stdout.lock();
        if let Err(e) = write_stale(&mut out, entry, verbose).and_then(|_| out.flush()) {
            warn!("Failed to write {}: {}", entry.path, e);
        }
    })?;

    write_errors(&mut stdout.lock(), &report.errors, args.quiet_errors)?;

    info!(
        "Checked {} repositories: {} up to date, {} stale, {} failed",
        report.checked,
        report.up_to_date,
        report.stale.len(),
        report.errors.len()
    );

    if args.strict && !report.is_all_up_to_date() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Initialize tracing with env filter; stdout is reserved for the report
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match execute(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
