//! Shared domain types.
//!
//! Everything here is a value object: produced once by a pipeline stage and read
//! by the stages after it. Missing numbers are `Option<f64>` all the way through,
//! so a null never masquerades as `0.0` or `NaN` in a mean or a regression.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// An inclusive, contiguous range of calendar years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    /// Longest range accepted; the merged table holds one row per year.
    pub const MAX_YEARS: usize = 1000;

    pub fn new(start: i32, end: i32) -> Result<Self, AppError> {
        if start > end {
            return Err(AppError::Config(format!(
                "year range start ({start}) is after its end ({end})."
            )));
        }
        let span = i64::from(end) - i64::from(start) + 1;
        if span > Self::MAX_YEARS as i64 {
            return Err(AppError::Config(format!(
                "year range {start}..={end} spans {span} years (at most {} allowed).",
                Self::MAX_YEARS
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(self) -> i32 {
        self.start
    }

    pub fn end(self) -> i32 {
        self.end
    }

    pub fn contains(self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    pub fn years(self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    pub fn len(self) -> usize {
        (i64::from(self.end) - i64::from(self.start) + 1) as usize
    }

    pub fn is_empty(self) -> bool {
        false
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: 2001,
            end: 2024,
        }
    }
}

/// The three raw metrics the pipeline tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Emissions,
    Electricity,
    Vehicles,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Emissions, Metric::Electricity, Metric::Vehicles];

    /// Canonical column name in the merged table.
    pub fn column(self) -> &'static str {
        match self {
            Metric::Emissions => "emissions_ktco2e",
            Metric::Electricity => "electricity_gwh",
            Metric::Vehicles => "vehicles_first_reg",
        }
    }

    /// Short label used for log lines and error messages.
    pub fn source_name(self) -> &'static str {
        match self {
            Metric::Emissions => "emissions",
            Metric::Electricity => "electricity",
            Metric::Vehicles => "vehicles",
        }
    }
}

/// One metric reported per year, as produced by a source extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub metric: Metric,
    values: BTreeMap<i32, Option<f64>>,
}

impl MetricSeries {
    /// Build a series, discarding years outside `range`.
    pub fn new(
        metric: Metric,
        values: impl IntoIterator<Item = (i32, Option<f64>)>,
        range: YearRange,
    ) -> Self {
        let values = values
            .into_iter()
            .filter(|(year, _)| range.contains(*year))
            .collect();
        Self { metric, values }
    }

    /// Value for `year`; `None` both when the year is absent and when it is null.
    pub fn get(&self, year: i32) -> Option<f64> {
        self.values.get(&year).copied().flatten()
    }

    pub fn contains_year(&self, year: i32) -> bool {
        self.values.contains_key(&year)
    }

    /// Years in ascending order with their (nullable) values.
    pub fn iter(&self) -> impl Iterator<Item = (i32, Option<f64>)> + '_ {
        self.values.iter().map(|(y, v)| (*y, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One row of the canonical merged table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearRow {
    pub year: i32,
    pub emissions_ktco2e: Option<f64>,
    pub electricity_gwh: Option<f64>,
    pub vehicles_first_reg: Option<f64>,
}

impl YearRow {
    pub fn empty(year: i32) -> Self {
        Self {
            year,
            emissions_ktco2e: None,
            electricity_gwh: None,
            vehicles_first_reg: None,
        }
    }

    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Emissions => self.emissions_ktco2e,
            Metric::Electricity => self.electricity_gwh,
            Metric::Vehicles => self.vehicles_first_reg,
        }
    }
}

/// Row-per-year table covering a whole [`YearRange`], ascending by year.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    pub range: YearRange,
    pub rows: Vec<YearRow>,
}

impl MergedTable {
    /// Column of one metric in row order.
    pub fn column(&self, metric: Metric) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.value(metric)).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Merged row plus its derived statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedRow {
    #[serde(flatten)]
    pub base: YearRow,
    pub emissions_z: Option<f64>,
    pub electricity_z: Option<f64>,
    pub vehicles_z: Option<f64>,
    pub d_emissions: Option<f64>,
    pub d_electricity: Option<f64>,
    pub d_vehicles: Option<f64>,
    pub roll_corr_elec: Option<f64>,
    pub roll_corr_veh: Option<f64>,
}

impl DerivedRow {
    /// Year-over-year delta of one metric.
    pub fn delta(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Emissions => self.d_emissions,
            Metric::Electricity => self.d_electricity,
            Metric::Vehicles => self.d_vehicles,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTable {
    pub rows: Vec<DerivedRow>,
}

impl DerivedTable {
    pub fn levels(&self, metric: Metric) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.base.value(metric)).collect()
    }

    pub fn deltas(&self, metric: Metric) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.delta(metric)).collect()
    }
}

/// Pearson r between a shifted predictor and emissions at one lag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagCorrelation {
    pub lag: i32,
    pub corr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagCorrelationTable {
    /// The metric correlated against emissions.
    pub metric: Metric,
    pub rows: Vec<LagCorrelation>,
}

impl LagCorrelationTable {
    pub fn at(&self, lag: i32) -> Option<f64> {
        self.rows.iter().find(|r| r.lag == lag).and_then(|r| r.corr)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub metric: String,
    pub pearson_r: Option<f64>,
}

/// Headline Pearson correlations of emissions against each driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    pub entries: Vec<CorrelationEntry>,
}

impl CorrelationSummary {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.metric == name)
            .and_then(|e| e.pearson_r)
    }
}

/// Which of the two fixed regressions a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Levels,
    Deltas,
}

impl ModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Levels => "levels",
            ModelKind::Deltas => "deltas",
        }
    }
}

/// Estimate and inference for one regressor (the intercept is named `const`).
///
/// Inference fields are `None` when the fit leaves no residual degrees of freedom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: Option<f64>,
    pub t_value: Option<f64>,
    pub p_value: Option<f64>,
    pub ci_lower: Option<f64>,
    pub ci_upper: Option<f64>,
}

/// A fitted OLS model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    pub model: ModelKind,
    pub response: String,
    pub coefficients: Vec<Coefficient>,
    pub n_obs: usize,
    pub rank: usize,
    pub df_model: usize,
    pub df_resid: usize,
    pub r_squared: f64,
    pub adj_r_squared: Option<f64>,
    pub f_statistic: Option<f64>,
    pub f_pvalue: Option<f64>,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub durbin_watson: Option<f64>,
    /// Human-readable table in the layout of a classic OLS report.
    pub summary: String,
}

impl RegressionResult {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Number of regressors excluding the intercept.
    pub fn n_predictors(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }
}

/// What to do when a single-row selection matches several rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguousRowPolicy {
    /// Take the first matching row and log a warning.
    #[default]
    First,
    /// Fail the run.
    Error,
}

/// Fixed constants of the statistical battery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    pub year_range: YearRange,
    /// Trailing window length (rows) for rolling correlations.
    pub rolling_window: usize,
    /// Complete pairs a rolling window needs before r is reported.
    pub rolling_min_pairs: usize,
    /// Lags `-max_lag..=max_lag` are evaluated.
    pub max_lag: usize,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.rolling_window < 2 {
            return Err(AppError::Config(format!(
                "rolling window must be at least 2 rows (got {}).",
                self.rolling_window
            )));
        }
        if self.rolling_min_pairs < 2 || self.rolling_min_pairs > self.rolling_window {
            return Err(AppError::Config(format!(
                "rolling min pairs must be within 2..={} (got {}).",
                self.rolling_window, self.rolling_min_pairs
            )));
        }
        if self.max_lag > YearRange::MAX_YEARS {
            return Err(AppError::Config(format!(
                "max lag must be at most {} years (got {}).",
                YearRange::MAX_YEARS,
                self.max_lag
            )));
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            year_range: YearRange::default(),
            rolling_window: 5,
            rolling_min_pairs: 5,
            max_lag: 3,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// Derived from CLI flags and environment (plus defaults).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub out_dir: PathBuf,
    pub analysis: AnalysisConfig,
    pub ambiguous_rows: AmbiguousRowPolicy,
}
