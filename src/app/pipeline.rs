//! Shared pipeline logic used by every subcommand.
//!
//! extract (×3, in parallel) -> merge -> derive -> correlations -> regressions
//!
//! Each stage returns plain values; nothing here writes files. The caller turns
//! the outputs into artifacts and writes them only after every stage succeeded.

use std::path::Path;

use tracing::info;

use crate::analysis::{correlation_summary, derive_table, fit_models, lag_table};
use crate::domain::{
    AmbiguousRowPolicy, AnalysisConfig, CorrelationSummary, DerivedTable, LagCorrelationTable, MergedTable, Metric,
    MetricSeries, PipelineConfig, RegressionResult, YearRange,
};
use crate::error::AppError;
use crate::ingest::{extract_source, rule_for};
use crate::io::export::{self, Artifact};
use crate::table::merge_series;

/// Extracted series plus the merged table built from them.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Emissions, electricity, vehicles, in that order.
    pub series: Vec<MetricSeries>,
    pub merged: MergedTable,
}

/// Everything the statistical battery computes from a merged table.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub derived: DerivedTable,
    pub lags: Vec<LagCorrelationTable>,
    pub summary: CorrelationSummary,
    pub regressions: Vec<RegressionResult>,
}

/// All computed outputs of a full `mstat run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub preprocessed: Preprocessed,
    pub analysis: Analysis,
}

impl Preprocessed {
    pub fn artifacts(&self) -> Result<Vec<Artifact>, AppError> {
        let mut out = self
            .series
            .iter()
            .map(export::series_artifact)
            .collect::<Result<Vec<_>, _>>()?;
        out.push(export::merged_artifact(&self.merged)?);
        Ok(out)
    }
}

impl Analysis {
    pub fn artifacts(&self) -> Result<Vec<Artifact>, AppError> {
        let mut out = vec![
            export::correlation_summary_artifact(&self.summary)?,
            export::derived_artifact(&self.derived)?,
        ];
        for table in &self.lags {
            out.push(export::lag_artifact(table)?);
        }
        out.push(export::ols_summary_artifact(&self.regressions));
        out.push(export::ols_json_artifact(&self.regressions)?);
        Ok(out)
    }
}

impl RunOutput {
    pub fn artifacts(&self) -> Result<Vec<Artifact>, AppError> {
        let mut out = self.preprocessed.artifacts()?;
        out.extend(self.analysis.artifacts()?);
        Ok(out)
    }
}

/// Run the three extractors concurrently; the first error (in source order) wins.
pub fn extract_all(
    data_dir: &Path,
    range: YearRange,
    policy: AmbiguousRowPolicy,
) -> Result<Vec<MetricSeries>, AppError> {
    let (emissions, (electricity, vehicles)) = rayon::join(
        || extract_source(rule_for(Metric::Emissions), data_dir, range, policy),
        || {
            rayon::join(
                || extract_source(rule_for(Metric::Electricity), data_dir, range, policy),
                || extract_source(rule_for(Metric::Vehicles), data_dir, range, policy),
            )
        },
    );
    Ok(vec![emissions?, electricity?, vehicles?])
}

/// Extract every source and merge onto the configured range.
pub fn preprocess(config: &PipelineConfig) -> Result<Preprocessed, AppError> {
    let range = config.analysis.year_range;
    let series = extract_all(&config.data_dir, range, config.ambiguous_rows)?;
    let refs: Vec<&MetricSeries> = series.iter().collect();
    let merged = merge_series(&refs, range);
    Ok(Preprocessed { series, merged })
}

/// Run the statistical battery over `merged`.
pub fn analyze(merged: &MergedTable, config: &AnalysisConfig) -> Result<Analysis, AppError> {
    let derived = derive_table(merged, config);
    let lags = [Metric::Electricity, Metric::Vehicles]
        .into_iter()
        .map(|m| lag_table(&derived, m, config.max_lag))
        .collect::<Result<Vec<_>, _>>()?;
    let summary = correlation_summary(&derived);
    let regressions = fit_models(&derived)?;

    info!(rows = derived.rows.len(), models = regressions.len(), "analysis complete");
    Ok(Analysis {
        derived,
        lags,
        summary,
        regressions,
    })
}

/// Full run: preprocess, then analyze the merged table.
pub fn run_pipeline(config: &PipelineConfig) -> Result<RunOutput, AppError> {
    let preprocessed = preprocess(config)?;
    let analysis = analyze(&preprocessed.merged, &config.analysis)?;
    Ok(RunOutput {
        preprocessed,
        analysis,
    })
}
