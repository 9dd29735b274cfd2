//! Builtin tool implementations
//!
//! Each tool keeps its pure parsing/formatting helpers separate from I/O.

pub mod calculator;
pub mod summary_lookup;

pub use calculator::{Calculator, EvalError, Number};
pub use summary_lookup::{SummaryLookupTool, DEFAULT_SUMMARY_ENDPOINT, NO_SUMMARY_PLACEHOLDER};
