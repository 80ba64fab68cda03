//! # File Reading and Writing
//!
//! Tab-delimited input tables (allele counts, PLAF, reference panel) and
//! the four output files written at the end of a run.

pub mod output;
pub mod table;

pub use output::OutputWriter;
pub use table::MarkerTable;
