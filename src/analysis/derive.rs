//! Per-row derived columns: z-scores, year-over-year deltas, rolling correlations.

use tracing::debug;

use crate::analysis::correlation::rolling_correlation;
use crate::domain::{AnalysisConfig, DerivedRow, DerivedTable, MergedTable, Metric};
use crate::math::{is_constant, mean, population_std};

/// Population z-score (ddof = 0) over the non-null entries.
///
/// Nulls stay null. A column with no spread (constant, single value, or empty)
/// has no defined z-score, so every entry is null.
pub fn zscore(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let (Some(m), Some(sd)) = (mean(values), population_std(values)) else {
        return vec![None; values.len()];
    };
    if sd == 0.0 || !sd.is_finite() || is_constant(values.iter().flatten().copied()) {
        return vec![None; values.len()];
    }
    values.iter().map(|v| v.map(|x| (x - m) / sd)).collect()
}

/// Row-order difference `v[i] - v[i-1]`; the first row is always null.
pub fn year_over_year(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(values.windows(2).map(|w| Some(w[1]? - w[0]?)));
    out
}

/// Extend `merged` with z-scores, deltas and trailing rolling correlations.
pub fn derive_table(merged: &MergedTable, config: &AnalysisConfig) -> DerivedTable {
    let emissions = merged.column(Metric::Emissions);
    let electricity = merged.column(Metric::Electricity);
    let vehicles = merged.column(Metric::Vehicles);

    let emissions_z = zscore(&emissions);
    let electricity_z = zscore(&electricity);
    let vehicles_z = zscore(&vehicles);

    let d_emissions = year_over_year(&emissions);
    let d_electricity = year_over_year(&electricity);
    let d_vehicles = year_over_year(&vehicles);

    let roll_elec = rolling_correlation(
        &emissions,
        &electricity,
        config.rolling_window,
        config.rolling_min_pairs,
    );
    let roll_veh = rolling_correlation(&emissions, &vehicles, config.rolling_window, config.rolling_min_pairs);

    let rows: Vec<DerivedRow> = merged
        .rows
        .iter()
        .enumerate()
        .map(|(i, base)| DerivedRow {
            base: *base,
            emissions_z: emissions_z[i],
            electricity_z: electricity_z[i],
            vehicles_z: vehicles_z[i],
            d_emissions: d_emissions[i],
            d_electricity: d_electricity[i],
            d_vehicles: d_vehicles[i],
            roll_corr_elec: roll_elec[i],
            roll_corr_veh: roll_veh[i],
        })
        .collect();

    debug!(
        rows = rows.len(),
        rolling_defined = rows.iter().filter(|r| r.roll_corr_elec.is_some()).count(),
        "derived table"
    );
    DerivedTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{YearRange, YearRow};

    #[test]
    fn zscore_has_zero_mean_and_unit_population_std() {
        let v = vec![Some(3.0), Some(7.0), None, Some(8.0), Some(12.0), Some(20.0)];
        let z = zscore(&v);
        assert_eq!(z[2], None);

        let present: Vec<Option<f64>> = z.iter().copied().filter(Option::is_some).collect();
        assert!(mean(&present).unwrap().abs() < 1e-12);
        assert!((population_std(&present).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zscore_uses_population_denominator() {
        // mean 2, population std sqrt(2/3); a sample std would give 1.
        let z = zscore(&[Some(1.0), Some(2.0), Some(3.0)]);
        let expected = 1.0 / (2.0_f64 / 3.0).sqrt();
        assert!((z[2].unwrap() - expected).abs() < 1e-12);
        assert!((z[0].unwrap() + expected).abs() < 1e-12);
    }

    #[test]
    fn zscore_of_constant_column_is_undefined() {
        assert_eq!(zscore(&[Some(0.1), Some(0.1), None, Some(0.1)]), vec![None; 4]);
        assert_eq!(zscore(&[Some(5.0)]), vec![None]);
        assert_eq!(zscore(&[None, None]), vec![None, None]);
    }

    #[test]
    fn deltas_follow_row_order() {
        let v = vec![Some(100.0), Some(110.0), None, Some(105.0), Some(101.0)];
        let d = year_over_year(&v);
        assert_eq!(d, vec![None, Some(10.0), None, None, Some(-4.0)]);
        assert!(year_over_year(&[]).is_empty());
        assert_eq!(year_over_year(&[Some(1.0)]), vec![None]);
    }

    #[test]
    fn derive_table_keeps_row_order_and_base_values() {
        let range = YearRange::new(2001, 2003).unwrap();
        let rows = vec![
            YearRow { year: 2001, emissions_ktco2e: Some(100.0), electricity_gwh: Some(50.0), vehicles_first_reg: Some(10.0) },
            YearRow { year: 2002, emissions_ktco2e: Some(110.0), electricity_gwh: Some(55.0), vehicles_first_reg: Some(12.0) },
            YearRow { year: 2003, emissions_ktco2e: Some(105.0), electricity_gwh: Some(52.0), vehicles_first_reg: Some(11.0) },
        ];
        let merged = MergedTable { range, rows };
        let config = AnalysisConfig { year_range: range, ..AnalysisConfig::default() };

        let derived = derive_table(&merged, &config);
        assert_eq!(derived.rows.len(), 3);
        assert_eq!(derived.rows[1].base.year, 2002);
        assert_eq!(derived.rows[1].d_emissions, Some(10.0));
        assert_eq!(derived.rows[1].d_electricity, Some(5.0));
        assert_eq!(derived.rows[1].d_vehicles, Some(2.0));
        assert!(derived.rows.iter().all(|r| r.roll_corr_elec.is_none()));
    }
}
