//! `mobility-stats` library crate.
//!
//! The binary (`mstat`) is a thin wrapper around this library so that:
//!
//! - the extraction rules and the statistics are testable without spawning processes
//! - the pipeline stages can be driven individually (preprocess only, analyze only)

pub mod analysis;
pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod io;
pub mod math;
pub mod report;
pub mod table;
