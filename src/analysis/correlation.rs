//! Correlation battery: headline summary, trailing rolling r, lagged r.

use crate::domain::{
    CorrelationEntry, CorrelationSummary, DerivedTable, LagCorrelation, LagCorrelationTable, Metric,
};
use crate::error::AppError;
use crate::math::{pearson, pearson_pairs, round_to};

/// Decimal places kept in the correlation summary.
pub const SUMMARY_DECIMALS: i32 = 3;

/// Trailing-window Pearson r by row position.
///
/// Row `i` uses rows `i + 1 - window ..= i`. Rows before the first full window
/// are null, as is any window with fewer than `max(min_pairs, 2)` complete
/// pairs or with no variation on one side.
pub fn rolling_correlation(
    x: &[Option<f64>],
    y: &[Option<f64>],
    window: usize,
    min_pairs: usize,
) -> Vec<Option<f64>> {
    let n = x.len().min(y.len());
    let need = min_pairs.max(2);
    let mut out = vec![None; n];
    if window == 0 || n < window {
        return out;
    }

    for end in (window - 1)..n {
        let start = end + 1 - window;
        let pairs: Vec<(f64, f64)> = (start..=end)
            .filter_map(|i| Some((x[i]?, y[i]?)))
            .collect();
        if pairs.len() >= need {
            out[end] = pearson_pairs(&pairs);
        }
    }
    out
}

/// Pearson r of `x` against `y` for every lag in `-max_lag..=max_lag`.
///
/// Negative lag `ℓ` pairs `x[i - |ℓ|]` with `y[i]`; non-negative lag pairs
/// `x[i]` with `y[i - ℓ]`. Only pairwise-complete rows count.
pub fn lag_correlations(
    x: &[Option<f64>],
    y: &[Option<f64>],
    max_lag: usize,
) -> Result<Vec<LagCorrelation>, AppError> {
    let max_lag = i32::try_from(max_lag)
        .map_err(|_| AppError::Config(format!("max lag {max_lag} does not fit a signed 32-bit lag.")))?;
    Ok((-max_lag..=max_lag)
        .map(|lag| {
            let shift = lag.unsigned_abs() as usize;
            let (xs, ys) = if lag < 0 {
                shifted(x, shift, y)
            } else {
                // Shifting y forward is the mirror image of shifting x.
                let (ys, xs) = shifted(y, shift, x);
                (xs, ys)
            };
            LagCorrelation {
                lag,
                corr: pearson(&xs, &ys),
            }
        })
        .collect())
}

/// Align `lagged[i - shift]` with `other[i]`.
fn shifted(lagged: &[Option<f64>], shift: usize, other: &[Option<f64>]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = lagged.len().min(other.len());
    if shift >= n {
        return (Vec::new(), Vec::new());
    }
    let a = lagged[..n - shift].to_vec();
    let b = other[shift..n].to_vec();
    (a, b)
}

/// Lag table of `metric` against emissions levels.
pub fn lag_table(derived: &DerivedTable, metric: Metric, max_lag: usize) -> Result<LagCorrelationTable, AppError> {
    let x = derived.levels(metric);
    let y = derived.levels(Metric::Emissions);
    Ok(LagCorrelationTable {
        metric,
        rows: lag_correlations(&x, &y, max_lag)?,
    })
}

/// Levels and deltas Pearson r of emissions against each driver, rounded.
pub fn correlation_summary(derived: &DerivedTable) -> CorrelationSummary {
    let emissions = derived.levels(Metric::Emissions);
    let d_emissions = derived.deltas(Metric::Emissions);

    let mut entries = Vec::with_capacity(4);
    for (label, metric) in [("levels_electricity", Metric::Electricity), ("levels_vehicles", Metric::Vehicles)] {
        entries.push(entry(label, pearson(&emissions, &derived.levels(metric))));
    }
    for (label, metric) in [("deltas_electricity", Metric::Electricity), ("deltas_vehicles", Metric::Vehicles)] {
        entries.push(entry(label, pearson(&d_emissions, &derived.deltas(metric))));
    }
    CorrelationSummary { entries }
}

fn entry(label: &str, r: Option<f64>) -> CorrelationEntry {
    CorrelationEntry {
        metric: label.to_string(),
        pearson_r: r.map(|v| round_to(v, SUMMARY_DECIMALS)),
    }
}
