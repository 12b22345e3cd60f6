//! Parallel Python source scanner
//!
//! This module wires the source walker to the thread pool: the driver
//! discovers search roots, lazily walks them for `.py` files, and submits
//! one parse-and-extract job per file.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────────┐
//!                  │         Scanner          │
//!                  │  - sys.path discovery    │
//!                  │  - SourceWalker (lazy)   │
//!                  │  - outcome aggregation   │
//!                  └────────────┬─────────────┘
//!                               │ schedule per-file jobs
//!        ┌──────────────────────┼──────────────────────┐
//!        │                      │                      │
//!  ┌─────▼─────┐          ┌─────▼─────┐          ┌─────▼─────┐
//!  │  Worker 1 │          │  Worker 2 │          │  Worker N │
//!  │ read+parse│          │ read+parse│          │ read+parse│
//!  │ extract   │          │ extract   │          │ extract   │
//!  └───────────┘          └───────────┘          └───────────┘
//!        │                      │                      │
//!        └───────── crossbeam outcome channel ─────────┘
//! ```

pub mod scan;
pub mod sources;

pub use scan::{ScanProgress, ScanReport, Scanner};
pub use sources::{walk_search_paths, PySource, SourceWalker};
