//! Scan driver
//!
//! Wires the pieces together: discover search roots from the interpreter,
//! walk them for `.py` sources, and fan the per-file parse jobs out over the
//! work-stealing pool. Workers report back over a bounded channel; the
//! driver drains exactly as many outcomes as it submitted, so completion
//! needs no separate tracking, then tears the pool down.
//!
//! Per-file problems (unreadable file, parser refusal, oversize source) are
//! logged and counted, never fatal: one bad file must not abort the scan.

use crate::arena::GrowthArena;
use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::parse::{module_symbols, parse, SymbolKind};
use crate::pool::{Batch, PoolConfig, Task, ThreadPool};
use crate::python::{discover_search_paths, module_path};
use crate::walker::sources::walk_search_paths;
use crossbeam_channel::{bounded, Sender};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Bound on in-flight outcomes; the driver drains while submitting, so this
/// only smooths bursts.
const OUTCOME_QUEUE_CAPACITY: usize = 1024;

/// Final result of a scan
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub roots: usize,
    pub files: u64,
    pub symbols: u64,
    pub bytes: u64,
    pub errors: u64,
    pub duration: Duration,
}

/// Snapshot for the live progress display
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    pub files: u64,
    pub symbols: u64,
    pub bytes: u64,
    pub errors: u64,
    pub total_workers: usize,
    pub elapsed: Duration,
}

impl ScanProgress {
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.files as f64 / secs
        } else {
            0.0
        }
    }
}

/// Result of one parse job
enum FileOutcome {
    Parsed {
        module: String,
        symbols: Vec<(SymbolKind, String)>,
        bytes: u64,
    },
    Skipped {
        path: PathBuf,
        reason: String,
    },
}

/// Context for one pool task. Boxed, leaked at submission, and reclaimed by
/// the callback; the embedded task's intrusive link is what sits in the
/// pool's queues.
struct ParseJob {
    task: Task,
    path: PathBuf,
    max_file_size: u64,
    outcome_tx: Sender<FileOutcome>,
}

impl ParseJob {
    /// Pool callback: reclaim the box, do the work, report the outcome.
    unsafe fn run(context: *mut ()) {
        let job = Box::from_raw(context as *mut ParseJob);
        let outcome = job.process();
        // The driver counts submissions; a failed send only happens if the
        // driver already gave up on the scan.
        let _ = job.outcome_tx.send(outcome);
    }

    fn process(&self) -> FileOutcome {
        match self.parse_file() {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!("skipping {:?}: {}", self.path, err);
                FileOutcome::Skipped {
                    path: self.path.clone(),
                    reason: err.to_string(),
                }
            }
        }
    }

    fn parse_file(&self) -> Result<FileOutcome> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len > self.max_file_size {
            return Ok(FileOutcome::Skipped {
                path: self.path.clone(),
                reason: format!("{} bytes exceeds the per-file cap", len),
            });
        }

        // The job's scratch memory: source bytes live in the arena and are
        // released in one pass when the job ends.
        let mut arena = GrowthArena::new((len as usize).max(64), (self.max_file_size as usize).max(64));
        let source = match arena.alloc_bytes(len as usize) {
            Some(source) => source,
            None => {
                return Ok(FileOutcome::Skipped {
                    path: self.path.clone(),
                    reason: "source buffer exceeds the arena budget".into(),
                })
            }
        };
        file.read_exact(source)?;

        let handle = parse(source)?;
        let symbols = module_symbols(&handle)
            .iter()
            .map(|symbol| (symbol.kind, symbol.name_lossy().into_owned()))
            .collect();
        let module = module_path(&self.path)?;

        Ok(FileOutcome::Parsed {
            module,
            symbols,
            bytes: len,
        })
    }
}

/// Parallel scanner over a Python installation
pub struct Scanner {
    config: ScanConfig,
    files_count: AtomicU64,
    symbols_count: AtomicU64,
    bytes_count: AtomicU64,
    errors_count: AtomicU64,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            files_count: AtomicU64::new(0),
            symbols_count: AtomicU64::new(0),
            bytes_count: AtomicU64::new(0),
            errors_count: AtomicU64::new(0),
        }
    }

    /// Snapshot the counters for the progress display.
    pub fn progress(&self, elapsed: Duration) -> ScanProgress {
        ScanProgress {
            files: self.files_count.load(Ordering::Relaxed),
            symbols: self.symbols_count.load(Ordering::Relaxed),
            bytes: self.bytes_count.load(Ordering::Relaxed),
            errors: self.errors_count.load(Ordering::Relaxed),
            total_workers: self.config.worker_count,
            elapsed,
        }
    }

    /// Run the scan to completion.
    pub fn run(&self) -> Result<ScanReport> {
        let start = Instant::now();

        let roots = discover_search_paths(&self.config.python)?;
        info!("discovered {} search roots", roots.len());

        let pool = ThreadPool::new(PoolConfig {
            max_threads: self.config.worker_count,
            stack_size: self.config.stack_size,
        });
        let (outcome_tx, outcome_rx) = bounded::<FileOutcome>(OUTCOME_QUEUE_CAPACITY);

        let mut submitted: u64 = 0;
        let mut completed: u64 = 0;

        for source in walk_search_paths(&roots) {
            let mut job = Box::new(ParseJob {
                task: Task::new(ParseJob::run, ptr::null_mut()),
                path: source.absolute(),
                max_file_size: self.config.max_file_size,
                outcome_tx: outcome_tx.clone(),
            });
            let context = &mut *job as *mut ParseJob as *mut ();
            job.task = Task::new(ParseJob::run, context);
            let task = NonNull::from(&Box::leak(job).task);

            pool.schedule(Batch::from(task));
            submitted += 1;

            // Drain opportunistically so workers never stall on the channel.
            while let Ok(outcome) = outcome_rx.try_recv() {
                self.record(outcome);
                completed += 1;
            }
        }
        drop(outcome_tx);

        while completed < submitted {
            let outcome = outcome_rx.recv().map_err(|_| ScanError::ChannelClosed)?;
            self.record(outcome);
            completed += 1;
        }

        pool.shutdown();
        pool.join();

        Ok(ScanReport {
            roots: roots.len(),
            files: self.files_count.load(Ordering::Relaxed),
            symbols: self.symbols_count.load(Ordering::Relaxed),
            bytes: self.bytes_count.load(Ordering::Relaxed),
            errors: self.errors_count.load(Ordering::Relaxed),
            duration: start.elapsed(),
        })
    }

    fn record(&self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Parsed {
                module,
                symbols,
                bytes,
            } => {
                self.files_count.fetch_add(1, Ordering::Relaxed);
                self.bytes_count.fetch_add(bytes, Ordering::Relaxed);
                self.symbols_count
                    .fetch_add(symbols.len() as u64, Ordering::Relaxed);
                if self.config.list_symbols {
                    for (kind, name) in &symbols {
                        println!("{}: {} {}", module, kind, name);
                    }
                }
            }
            FileOutcome::Skipped { path, reason } => {
                self.errors_count.fetch_add(1, Ordering::Relaxed);
                debug!("skipped {:?}: {}", path, reason);
            }
        }
    }
}
