//! The statistical battery run over a merged table.
//!
//! - per-row derived columns (`derive`)
//! - correlation summary, rolling and lagged correlations (`correlation`)
//! - the levels and deltas regressions (`regression`)

pub mod correlation;
pub mod derive;
pub mod regression;

pub use correlation::*;
pub use derive::*;
pub use regression::*;
