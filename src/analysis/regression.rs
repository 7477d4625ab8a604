//! The two fixed OLS models: levels and year-over-year deltas.

use chrono::Local;
use tracing::{debug, info};

use crate::domain::{Coefficient, DerivedTable, Metric, ModelKind, RegressionResult};
use crate::error::AppError;
use crate::math::ols::{OlsFit, fit_with_intercept};
use crate::report::format_regression_summary;

/// Name given to the intercept term.
pub const INTERCEPT: &str = "const";

/// A named column of the design.
struct Term {
    name: &'static str,
    values: Vec<Option<f64>>,
}

/// Fit `emissions_ktco2e ~ const + electricity_gwh + vehicles_first_reg`.
pub fn fit_levels(derived: &DerivedTable) -> Result<RegressionResult, AppError> {
    let response = Term {
        name: Metric::Emissions.column(),
        values: derived.levels(Metric::Emissions),
    };
    let predictors = [Metric::Electricity, Metric::Vehicles].map(|m| Term {
        name: m.column(),
        values: derived.levels(m),
    });
    fit_model(ModelKind::Levels, response, &predictors)
}

/// Fit `d_emissions ~ const + d_electricity + d_vehicles`.
pub fn fit_deltas(derived: &DerivedTable) -> Result<RegressionResult, AppError> {
    let response = Term {
        name: "d_emissions",
        values: derived.deltas(Metric::Emissions),
    };
    let predictors = [
        Term {
            name: "d_electricity",
            values: derived.deltas(Metric::Electricity),
        },
        Term {
            name: "d_vehicles",
            values: derived.deltas(Metric::Vehicles),
        },
    ];
    fit_model(ModelKind::Deltas, response, &predictors)
}

/// Both models, levels first.
pub fn fit_models(derived: &DerivedTable) -> Result<Vec<RegressionResult>, AppError> {
    Ok(vec![fit_levels(derived)?, fit_deltas(derived)?])
}

fn fit_model(model: ModelKind, response: Term, predictors: &[Term]) -> Result<RegressionResult, AppError> {
    // Listwise deletion: keep rows where the response and every predictor are present.
    let mut y = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); predictors.len()];
    for (i, target) in response.values.iter().enumerate() {
        let Some(target) = *target else { continue };
        let row: Option<Vec<f64>> = predictors.iter().map(|p| p.values.get(i).copied().flatten()).collect();
        let Some(row) = row else { continue };
        y.push(target);
        for (col, v) in columns.iter_mut().zip(row) {
            col.push(v);
        }
    }

    debug!(
        model = model.display_name(),
        rows = response.values.len(),
        complete = y.len(),
        "listwise deletion"
    );
    if y.is_empty() {
        return Err(AppError::InsufficientData {
            model: model.display_name().to_string(),
        });
    }

    let fit = fit_with_intercept(&y, &columns)?;
    info!(
        model = model.display_name(),
        n_obs = fit.n_obs,
        rank = fit.rank,
        r_squared = fit.r_squared,
        "fitted OLS"
    );

    let names: Vec<&str> = std::iter::once(INTERCEPT)
        .chain(predictors.iter().map(|p| p.name))
        .collect();
    let mut result = to_result(model, response.name, &names, &fit);
    result.summary = format_regression_summary(&result, Local::now().naive_local());
    Ok(result)
}

fn to_result(model: ModelKind, response: &str, names: &[&str], fit: &OlsFit) -> RegressionResult {
    let at = |v: &Option<Vec<f64>>, i: usize| v.as_ref().and_then(|v| v.get(i).copied());
    let coefficients = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let ci = fit.conf_int.as_ref().and_then(|c| c.get(i).copied());
            Coefficient {
                name: (*name).to_string(),
                estimate: fit.params[i],
                std_error: at(&fit.std_errors, i),
                t_value: at(&fit.t_values, i),
                p_value: at(&fit.p_values, i),
                ci_lower: ci.map(|c| c.0),
                ci_upper: ci.map(|c| c.1),
            }
        })
        .collect();

    RegressionResult {
        model,
        response: response.to_string(),
        coefficients,
        n_obs: fit.n_obs,
        rank: fit.rank,
        df_model: fit.df_model,
        df_resid: fit.df_resid,
        r_squared: fit.r_squared,
        adj_r_squared: fit.adj_r_squared,
        f_statistic: fit.f_statistic,
        f_pvalue: fit.f_pvalue,
        log_likelihood: fit.log_likelihood,
        aic: fit.aic,
        bic: fit.bic,
        durbin_watson: fit.durbin_watson,
        summary: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::derive_table;
    use crate::domain::{AnalysisConfig, MergedTable, YearRange, YearRow};

    fn derived(rows: &[(i32, Option<f64>, Option<f64>, Option<f64>)]) -> DerivedTable {
        let range = YearRange::new(rows[0].0, rows[rows.len() - 1].0).unwrap();
        let merged = MergedTable {
            range,
            rows: rows
                .iter()
                .map(|&(year, e, el, v)| YearRow {
                    year,
                    emissions_ktco2e: e,
                    electricity_gwh: el,
                    vehicles_first_reg: v,
                })
                .collect(),
        };
        derive_table(&merged, &AnalysisConfig { year_range: range, ..AnalysisConfig::default() })
    }

    #[test]
    fn levels_fit_on_three_year_scenario() {
        let table = derived(&[
            (2001, Some(100.0), Some(50.0), Some(10.0)),
            (2002, Some(110.0), Some(55.0), Some(12.0)),
            (2003, Some(105.0), Some(52.0), Some(11.0)),
        ]);
        let result = fit_levels(&table).unwrap();

        assert_eq!(result.model, ModelKind::Levels);
        assert_eq!(result.response, "emissions_ktco2e");
        assert_eq!(result.n_obs, 3);
        assert_eq!(result.n_predictors(), 2);
        assert_eq!(result.df_resid, 0);
        assert!(result.coefficient(INTERCEPT).is_some());
        assert!(result.coefficient("vehicles_first_reg").unwrap().std_error.is_none());
        assert!(result.summary.contains("emissions_ktco2e"));
    }

    #[test]
    fn deltas_fit_drops_the_first_row() {
        let table = derived(&[
            (2001, Some(100.0), Some(50.0), Some(10.0)),
            (2002, Some(110.0), Some(55.0), Some(12.0)),
            (2003, Some(105.0), Some(52.0), Some(11.0)),
            (2004, Some(108.0), Some(56.0), Some(15.0)),
            (2005, Some(99.0), Some(51.0), Some(13.0)),
            (2006, Some(101.0), Some(50.0), Some(12.0)),
        ]);
        let result = fit_deltas(&table).unwrap();
        assert_eq!(result.n_obs, 5);
        assert_eq!(result.df_resid, 2);
        assert!(result.coefficient("d_electricity").unwrap().p_value.is_some());
    }

    #[test]
    fn listwise_deletion_skips_rows_with_any_null() {
        let table = derived(&[
            (2001, Some(100.0), Some(50.0), Some(10.0)),
            (2002, Some(110.0), None, Some(12.0)),
            (2003, Some(105.0), Some(52.0), None),
            (2004, None, Some(53.0), Some(14.0)),
            (2005, Some(108.0), Some(56.0), Some(15.0)),
            (2006, Some(99.0), Some(51.0), Some(13.0)),
            (2007, Some(97.0), Some(49.0), Some(16.0)),
        ]);
        let result = fit_levels(&table).unwrap();
        assert_eq!(result.n_obs, 4);
    }

    #[test]
    fn collinear_predictor_gives_perfect_fit() {
        let rows: Vec<_> = (0..8)
            .map(|i| {
                let elec = 50.0 + (i * i) as f64;
                (2001 + i, Some(2.0 * elec + 5.0), Some(elec), Some(3.0 * elec))
            })
            .collect();
        let result = fit_levels(&derived(&rows)).unwrap();
        assert!((result.r_squared - 1.0).abs() < 1e-9);
        assert_eq!(result.rank, 2);
    }

    #[test]
    fn no_complete_rows_is_insufficient_data() {
        let table = derived(&[
            (2001, Some(100.0), None, Some(10.0)),
            (2002, None, Some(55.0), Some(12.0)),
        ]);
        let err = fit_levels(&table).unwrap_err();
        assert!(matches!(&err, AppError::InsufficientData { model } if model == "levels"));

        let err = fit_deltas(&table).unwrap_err();
        assert!(matches!(&err, AppError::InsufficientData { model } if model == "deltas"));
    }
}
