//! Python source parsing and symbol extraction
//!
//! A thin facade over tree-sitter plus a walker that enumerates the public
//! module-level names a file exports.

pub mod parser;
pub mod symbols;

pub use parser::{parse, ParseHandle};
pub use symbols::{module_symbols, Symbol, SymbolKind};
