//! Text formatting: regression summaries, the OLS report file, and terminal output.
//!
//! Formatting lives in one place so the math code stays free of layout concerns
//! and output changes are localized.

use chrono::NaiveDateTime;

use crate::domain::{CorrelationSummary, LagCorrelationTable, MergedTable, Metric, ModelKind, RegressionResult};

/// Width of the regression summary block.
const WIDTH: usize = 78;

/// Section header used in the OLS report for one model.
pub fn section_header(model: ModelKind) -> &'static str {
    match model {
        ModelKind::Levels => "=== OLS (levels): emissions_ktco2e ~ electricity_gwh + vehicles_first_reg ===",
        ModelKind::Deltas => "=== OLS (deltas): d_emissions ~ d_electricity + d_vehicles ===",
    }
}

/// Classic OLS results table for one fitted model.
///
/// Statistics that are undefined for the fit (no residual degrees of freedom)
/// are printed as `nan`.
pub fn format_regression_summary(result: &RegressionResult, generated: NaiveDateTime) -> String {
    let mut out = String::new();
    let rule = "=".repeat(WIDTH);

    out.push_str(&format!("{:^WIDTH$}", "OLS Regression Results").trim_end().to_string());
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');

    let header = [
        ("Dep. Variable:", truncate(&result.response, 16), "R-squared:", fmt_fixed(Some(result.r_squared), 3)),
        ("Model:", "OLS".to_string(), "Adj. R-squared:", fmt_fixed(result.adj_r_squared, 3)),
        ("Method:", "Least Squares".to_string(), "F-statistic:", fmt_general(result.f_statistic)),
        (
            "Date:",
            generated.format("%a, %d %b %Y").to_string(),
            "Prob (F-statistic):",
            fmt_sci(result.f_pvalue),
        ),
        (
            "Time:",
            generated.format("%H:%M:%S").to_string(),
            "Log-Likelihood:",
            fmt_general(Some(result.log_likelihood)),
        ),
        ("No. Observations:", result.n_obs.to_string(), "AIC:", fmt_general(Some(result.aic))),
        ("Df Residuals:", result.df_resid.to_string(), "BIC:", fmt_general(Some(result.bic))),
        ("Df Model:", result.df_model.to_string(), "", String::new()),
        ("Covariance Type:", "nonrobust".to_string(), "", String::new()),
    ];
    for (l_label, l_value, r_label, r_value) in header {
        let line = format!("{l_label:<21}{l_value:>16}   {r_label:<21}{r_value:>17}");
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!(
        "{:<19}{:>11}{:>10}{:>9}{:>9}{:>10}{:>10}\n",
        "", "coef", "std err", "t", "P>|t|", "[0.025", "0.975]"
    ));
    out.push_str(&"-".repeat(WIDTH));
    out.push('\n');
    for c in &result.coefficients {
        out.push_str(&format!(
            "{:<19}{:>11}{:>10}{:>9}{:>9}{:>10}{:>10}\n",
            truncate(&c.name, 18),
            fmt_general(Some(c.estimate)),
            fmt_general(c.std_error),
            fmt_fixed(c.t_value, 3),
            fmt_fixed(c.p_value, 3),
            fmt_general(c.ci_lower),
            fmt_general(c.ci_upper),
        ));
    }
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("{:<21}{:>16}\n", "Durbin-Watson:", fmt_fixed(result.durbin_watson, 3)));
    out.push_str(&rule);
    out.push('\n');

    if result.df_resid == 0 {
        out.push_str("\nNotes:\n[1] No residual degrees of freedom; standard errors and tests are undefined.\n");
    } else if result.rank < result.coefficients.len() {
        out.push_str(&format!(
            "\nNotes:\n[1] Design matrix has rank {} < {} columns; regressors are collinear.\n",
            result.rank,
            result.coefficients.len()
        ));
    }

    out
}

/// Full contents of `ols_summary.txt`: each model's summary under its header.
pub fn format_ols_report(results: &[RegressionResult]) -> String {
    results
        .iter()
        .map(|r| format!("{}\n{}", section_header(r.model), r.summary.trim_end()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Terminal summary of a completed analysis.
pub fn format_run_summary(
    merged: &MergedTable,
    summary: &CorrelationSummary,
    lags: &[LagCorrelationTable],
    results: &[RegressionResult],
) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== mstat - Finland emissions drivers ({}-{}) ===\n",
        merged.range.start(),
        merged.range.end()
    ));
    for metric in Metric::ALL {
        let present = merged.rows.iter().filter(|r| r.value(metric).is_some()).count();
        out.push_str(&format!("{:<20} {present:>3}/{} years\n", metric.column(), merged.len()));
    }

    out.push_str("\nCorrelations (Pearson r):\n");
    for entry in &summary.entries {
        out.push_str(&format!("  {:<20} {:>7}\n", entry.metric, fmt_fixed(entry.pearson_r, 3)));
    }

    for table in lags {
        let best = table
            .rows
            .iter()
            .filter_map(|r| r.corr.map(|c| (r.lag, c)))
            .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap_or(std::cmp::Ordering::Equal));
        match best {
            Some((lag, corr)) => out.push_str(&format!(
                "  strongest lag ({}): {lag:+} (r={corr:.3})\n",
                table.metric.source_name()
            )),
            None => out.push_str(&format!("  strongest lag ({}): n/a\n", table.metric.source_name())),
        }
    }

    out.push_str("\nRegressions:\n");
    for r in results {
        out.push_str(&format!(
            "  {:<7} n={:<3} R2={} adj.R2={}\n",
            r.model.display_name(),
            r.n_obs,
            fmt_fixed(Some(r.r_squared), 3),
            fmt_fixed(r.adj_r_squared, 3)
        ));
    }

    out
}

fn fmt_fixed(v: Option<f64>, places: usize) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.places$}"),
        Some(x) if x == f64::INFINITY => "inf".to_string(),
        Some(x) if x == f64::NEG_INFINITY => "-inf".to_string(),
        _ => "nan".to_string(),
    }
}

/// Four significant-ish digits without switching to exponent for typical magnitudes.
fn fmt_general(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => {
            let mag = x.abs();
            if mag != 0.0 && !(1e-4..1e7).contains(&mag) {
                format!("{x:.3e}")
            } else if mag >= 1e4 {
                format!("{x:.1}")
            } else {
                format!("{x:.4}")
            }
        }
        other => fmt_fixed(other, 0),
    }
}

fn fmt_sci(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.2e}"),
        other => fmt_fixed(other, 0),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coefficient, CorrelationEntry, LagCorrelation, YearRange, YearRow};
    use chrono::NaiveDate;

    fn result(model: ModelKind, df_resid: usize) -> RegressionResult {
        let coef = |name: &str, estimate: f64| Coefficient {
            name: name.to_string(),
            estimate,
            std_error: (df_resid > 0).then_some(0.5),
            t_value: (df_resid > 0).then_some(estimate / 0.5),
            p_value: (df_resid > 0).then_some(0.01),
            ci_lower: (df_resid > 0).then_some(estimate - 1.0),
            ci_upper: (df_resid > 0).then_some(estimate + 1.0),
        };
        RegressionResult {
            model,
            response: "emissions_ktco2e".to_string(),
            coefficients: vec![coef("const", 12.5), coef("electricity_gwh", 0.8), coef("vehicles_first_reg", -0.02)],
            n_obs: 3 + df_resid,
            rank: 3,
            df_model: 2,
            df_resid,
            r_squared: 0.91,
            adj_r_squared: (df_resid > 0).then_some(0.88),
            f_statistic: (df_resid > 0).then_some(40.0),
            f_pvalue: (df_resid > 0).then_some(1.2e-6),
            log_likelihood: -52.1,
            aic: 110.2,
            bic: 113.0,
            durbin_watson: Some(1.7),
            summary: String::new(),
        }
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn summary_lists_every_coefficient() {
        let text = format_regression_summary(&result(ModelKind::Levels, 21), at());
        assert!(text.contains("OLS Regression Results"));
        assert!(text.contains("Dep. Variable:"));
        assert!(text.contains("No. Observations:"));
        assert!(text.contains("Fri, 16 Oct 2026"));
        for name in ["const", "electricity_gwh", "vehicles_first_reg"] {
            assert!(text.contains(name), "missing {name}");
        }
        assert!(text.contains("0.910"));
        assert!(!text.contains("nan"));
        assert!(text.lines().all(|l| l.chars().count() <= WIDTH));
    }

    #[test]
    fn saturated_summary_prints_nan() {
        let text = format_regression_summary(&result(ModelKind::Levels, 0), at());
        assert!(text.contains("nan"));
        assert!(text.contains("No residual degrees of freedom"));
    }

    #[test]
    fn ols_report_has_both_headers_in_order() {
        let mut levels = result(ModelKind::Levels, 5);
        levels.summary = "LEVELS".to_string();
        let mut deltas = result(ModelKind::Deltas, 4);
        deltas.summary = "DELTAS".to_string();

        let report = format_ols_report(&[levels, deltas]);
        assert!(report.starts_with("=== OLS (levels): emissions_ktco2e ~ electricity_gwh + vehicles_first_reg ==="));
        let levels_at = report.find("LEVELS").unwrap();
        let deltas_header = report
            .find("\n\n=== OLS (deltas): d_emissions ~ d_electricity + d_vehicles ===")
            .unwrap();
        assert!(levels_at < deltas_header);
        assert!(report.ends_with("DELTAS"));
    }

    #[test]
    fn run_summary_reports_coverage_and_lags() {
        let range = YearRange::new(2001, 2002).unwrap();
        let merged = MergedTable {
            range,
            rows: vec![
                YearRow { year: 2001, emissions_ktco2e: Some(1.0), electricity_gwh: None, vehicles_first_reg: Some(3.0) },
                YearRow::empty(2002),
            ],
        };
        let summary = CorrelationSummary {
            entries: vec![CorrelationEntry { metric: "levels_electricity".to_string(), pearson_r: None }],
        };
        let lags = vec![LagCorrelationTable {
            metric: Metric::Vehicles,
            rows: vec![
                LagCorrelation { lag: -1, corr: Some(0.2) },
                LagCorrelation { lag: 1, corr: Some(-0.9) },
            ],
        }];

        let text = format_run_summary(&merged, &summary, &lags, &[]);
        assert!(text.contains("(2001-2002)"));
        assert!(text.contains("emissions_ktco2e       1/2 years"));
        assert!(text.contains("electricity_gwh        0/2 years"));
        assert!(text.contains("strongest lag (vehicles): +1 (r=-0.900)"));
    }
}
