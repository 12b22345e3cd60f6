//! Configuration types for pyscout
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;

/// Maximum reasonable worker count (also bounded by the pool's 14-bit
/// spawned counter, which is far larger)
const MAX_WORKERS: usize = 512;

/// Smallest accepted per-file size cap
const MIN_MAX_FILE_SIZE: u64 = 4 * 1024;

/// Smallest accepted worker stack size
const MIN_STACK_SIZE: usize = 64 * 1024;

/// Default per-file size cap (10 MiB); larger sources are logged and skipped
const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Scan a Python installation for importable module symbols
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pyscout",
    version,
    about = "Scan a Python installation for importable module symbols",
    long_about = "Asks the given interpreter for its sys.path, walks every search root for\n\
                  .py sources, and parses each file in parallel to extract the public\n\
                  classes, functions, and variables it exports.",
    after_help = "EXAMPLES:\n    \
        pyscout python3\n    \
        pyscout /usr/bin/python3 -w 16 -l\n    \
        pyscout ~/.venvs/app/bin/python --max-file-size 4194304 -v"
)]
pub struct CliArgs {
    /// Python interpreter whose sys.path should be scanned
    #[arg(value_name = "PYTHON")]
    pub python: PathBuf,

    /// Number of parser worker threads
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Skip source files larger than this many bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE, value_name = "BYTES")]
    pub max_file_size: u64,

    /// Worker thread stack size in bytes (OS default if not set)
    #[arg(long, value_name = "BYTES")]
    pub stack_size: Option<usize>,

    /// List every discovered symbol on stdout
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (show per-file errors and skips)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Default worker count: one per logical CPU
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Validated runtime configuration for a scan
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Interpreter whose sys.path is scanned
    pub python: PathBuf,

    /// Number of parser worker threads
    pub worker_count: usize,

    /// Per-file size cap in bytes
    pub max_file_size: u64,

    /// Worker stack size, if overridden
    pub stack_size: Option<usize>,

    /// Print each symbol to stdout
    pub list_symbols: bool,

    /// Show live progress
    pub show_progress: bool,
}

impl ScanConfig {
    /// Build and validate a configuration from parsed CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if args.max_file_size < MIN_MAX_FILE_SIZE {
            return Err(ConfigError::InvalidMaxFileSize {
                size: args.max_file_size,
                min: MIN_MAX_FILE_SIZE,
            });
        }

        if let Some(stack_size) = args.stack_size {
            if stack_size < MIN_STACK_SIZE {
                return Err(ConfigError::InvalidStackSize {
                    size: stack_size,
                    min: MIN_STACK_SIZE,
                });
            }
        }

        Ok(Self {
            python: args.python,
            worker_count: args.workers,
            max_file_size: args.max_file_size,
            stack_size: args.stack_size,
            list_symbols: args.list,
            show_progress: !args.quiet,
        })
    }
}
