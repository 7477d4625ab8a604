//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the year axis and per-metric series (`YearRange`, `MetricSeries`)
//! - the merged and derived tables (`MergedTable`, `DerivedTable`)
//! - statistical outputs (`LagCorrelationTable`, `RegressionResult`, ...)
//! - run configuration (`AnalysisConfig`, `PipelineConfig`)

pub mod types;

pub use types::*;
