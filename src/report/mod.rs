//! Reporting utilities: regression summaries and terminal output.

pub mod format;

pub use format::*;
