//! pyscout - Python Import Index Scanner
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use pyscout::config::{CliArgs, ScanConfig};
use pyscout::progress::{print_header, print_summary, ProgressReporter};
use pyscout::walker::Scanner;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    if let Err(err) = run(args) {
        error!("scan aborted: {:#}", err);
        eprintln!("pyscout: {:#}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(args: CliArgs) -> Result<()> {
    let config = ScanConfig::from_args(args).context("invalid configuration")?;

    if config.show_progress {
        print_header(&config.python.display().to_string(), config.worker_count);
    }

    let show_progress = config.show_progress;
    let scanner = Arc::new(Scanner::new(config));

    // Live progress line, fed from the scanner's counters
    let reporter = show_progress.then(|| Arc::new(ProgressReporter::new()));
    let progress_thread = reporter.as_ref().map(|reporter| {
        let reporter = Arc::clone(reporter);
        let scanner = Arc::clone(&scanner);
        let start = Instant::now();
        std::thread::spawn(move || {
            while !reporter.is_stopped() {
                reporter.update(&scanner.progress(start.elapsed()));
                std::thread::sleep(Duration::from_millis(200));
            }
        })
    });

    let result = scanner.run();

    if let Some(reporter) = &reporter {
        reporter.finish(None);
    }
    if let Some(handle) = progress_thread {
        let _ = handle.join();
    }

    let report = result.context("scan failed")?;

    if show_progress {
        print_summary(
            report.files,
            report.symbols,
            report.bytes,
            report.errors,
            report.duration,
        );
    }

    Ok(())
}

/// Configure tracing output: RUST_LOG wins, otherwise -v raises the level.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "pyscout=debug" } else { "pyscout=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
