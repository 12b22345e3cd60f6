//! pyscout - Python Import Index Scanner
//!
//! A tool that scans a Python installation's import search path and, for
//! every reachable `.py` source, extracts the public module-level symbols it
//! exports. Built as groundwork for a language server that resolves and
//! suggests imports across a project's full dependency closure.
//!
//! # Features
//!
//! - **Interpreter-Driven Discovery**: Asks the target interpreter for its
//!   own `sys.path`, so virtualenvs and custom layouts come for free.
//!
//! - **Work-Stealing Parallelism**: A hand-built lock-free thread pool with
//!   per-worker ring buffers, overflow queues, and futex idle parking keeps
//!   every core busy on large installations.
//!
//! - **Grammar-Accurate Extraction**: Symbols come from a real tree-sitter
//!   parse, including definitions guarded by module-level `try:`/`if:`
//!   blocks (Python's conditional-import idiom).
//!
//! - **Memory Discipline**: Each parse job reads its source into a growth
//!   arena that is released in one pass when the job ends.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Python Interpreter                          │
//! │                 (sys.path, one entry/line)                      │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ subprocess
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   Scanner: SourceWalker over roots, one job per .py file        │
//! │                         │                                       │
//! │                         ▼                                       │
//! │            ┌──────────────────────────┐                         │
//! │            │   Work-Stealing Pool     │                         │
//! │            │  global injector +       │                         │
//! │            │  per-worker rings (256)  │                         │
//! │            └──────────┬───────────────┘                         │
//! │  ┌─────────┐  ┌───────▼─┐  ┌─────────┐         ┌─────────┐     │
//! │  │Worker 1 │  │Worker 2 │  │Worker 3 │  ...    │Worker N │     │
//! │  │ read    │  │ read    │  │ read    │         │ read    │     │
//! │  │ parse   │  │ parse   │  │ parse   │         │ parse   │     │
//! │  │ extract │  │ extract │  │ extract │         │ extract │     │
//! │  └────┬────┘  └────┬────┘  └────┬────┘         └────┬────┘     │
//! │       └────────────┴─────┬──────┴────────────────────┘          │
//! │                          ▼                                      │
//! │            ┌──────────────────────────┐                         │
//! │            │   Outcome channel        │                         │
//! │            │  (module, symbols, ...)  │                         │
//! │            └──────────────────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Scan the system interpreter
//! pyscout python3
//!
//! # List every public symbol of a virtualenv, 16 workers
//! pyscout ~/.venvs/app/bin/python -w 16 -l
//! ```

pub mod arena;
pub mod config;
pub mod error;
pub mod parse;
pub mod pool;
pub mod progress;
pub mod python;
pub mod walker;

pub use config::{CliArgs, ScanConfig};
pub use error::{Result, ScanError};
pub use parse::{module_symbols, parse, Symbol, SymbolKind};
pub use pool::{Batch, PoolConfig, Task, ThreadPool};
pub use python::{discover_search_paths, module_path};
pub use walker::{ScanProgress, ScanReport, Scanner, SourceWalker};
