//! Ordinary least squares with classical inference.
//!
//! We solve
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! with an intercept column prepended to the regressors.
//!
//! Implementation choices:
//! - SVD for the solve, so tall, square and rank-deficient designs all work.
//!   Singular values below a relative tolerance are treated as zero, which gives
//!   the minimum-norm solution for collinear regressors (same convention as a
//!   pseudo-inverse).
//! - The parameter covariance comes from the same SVD: `σ² V S⁻² Vᵀ`.
//! - `df_resid = n - rank`. With no residual degrees of freedom every
//!   scale-dependent statistic is reported as `None`.

use nalgebra::{DMatrix, DVector, Dyn, SVD};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

use crate::error::AppError;

/// Two-sided confidence level for coefficient intervals.
pub const CONFIDENCE_LEVEL: f64 = 0.95;

type Svd = SVD<f64, Dyn, Dyn>;

/// Raw output of an intercept-plus-regressors OLS fit.
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// `[intercept, β_1, …, β_p]`.
    pub params: Vec<f64>,
    pub std_errors: Option<Vec<f64>>,
    pub t_values: Option<Vec<f64>>,
    pub p_values: Option<Vec<f64>>,
    pub conf_int: Option<Vec<(f64, f64)>>,
    pub residuals: Vec<f64>,
    pub n_obs: usize,
    pub rank: usize,
    pub df_model: usize,
    pub df_resid: usize,
    pub ssr: f64,
    pub r_squared: f64,
    pub adj_r_squared: Option<f64>,
    pub f_statistic: Option<f64>,
    pub f_pvalue: Option<f64>,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub durbin_watson: Option<f64>,
}

/// Solve a least squares problem using SVD.
///
/// Returns the coefficients and the numerical rank of `x`, or `None` if the
/// solve produced non-finite values.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<(DVector<f64>, usize)> {
    let svd = x.clone().svd(true, true);
    let tol = rank_tolerance(&svd.singular_values);
    let beta = solve_with_svd(&svd, tol, y)?;
    Some((beta, svd.rank(tol)))
}

fn solve_with_svd(svd: &Svd, tol: f64, y: &DVector<f64>) -> Option<DVector<f64>> {
    let beta = svd.solve(y, tol).ok()?;
    beta.iter().all(|v| v.is_finite()).then_some(beta)
}

/// Relative cutoff below which a singular value counts as zero.
const RCOND: f64 = 1e-10;

fn rank_tolerance(singular_values: &DVector<f64>) -> f64 {
    singular_values.iter().copied().fold(0.0_f64, f64::max) * RCOND
}

/// Fit `y ~ 1 + columns` by OLS.
///
/// `columns` holds one vector per regressor, each as long as `y`. Inputs must
/// already be free of missing values.
pub fn fit_with_intercept(y: &[f64], columns: &[Vec<f64>]) -> Result<OlsFit, AppError> {
    let n = y.len();
    if n == 0 {
        return Err(AppError::Numerical("OLS needs at least one observation.".to_string()));
    }
    if let Some(bad) = columns.iter().find(|c| c.len() != n) {
        return Err(AppError::Numerical(format!(
            "regressor has {} rows but the response has {n}.",
            bad.len()
        )));
    }

    let k = columns.len() + 1;
    let x = DMatrix::from_fn(n, k, |i, j| if j == 0 { 1.0 } else { columns[j - 1][i] });
    let yv = DVector::from_row_slice(y);

    // One decomposition serves the solve, the rank and the covariance.
    let svd = x.clone().svd(true, true);
    let tol = rank_tolerance(&svd.singular_values);
    let rank = svd.rank(tol);
    let beta = solve_with_svd(&svd, tol, &yv)
        .ok_or_else(|| AppError::Numerical("least squares solve produced non-finite coefficients.".to_string()))?;

    let fitted = &x * &beta;
    let residuals: Vec<f64> = (0..n).map(|i| yv[i] - fitted[i]).collect();
    let ssr: f64 = residuals.iter().map(|e| e * e).sum();
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let tss: f64 = y.iter().map(|v| (v - y_mean) * (v - y_mean)).sum();
    let ess = (tss - ssr).max(0.0);

    let df_model = rank.saturating_sub(1);
    let df_resid = n.saturating_sub(rank);
    let r_squared = 1.0 - ssr / tss;

    let nf = n as f64;
    let log_likelihood = -nf / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (ssr / nf).ln() + 1.0);
    let k_params = rank as f64;
    let aic = -2.0 * log_likelihood + 2.0 * k_params;
    let bic = -2.0 * log_likelihood + k_params * nf.ln();

    let durbin_watson = if n >= 2 && ssr > 0.0 {
        let num: f64 = residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        Some(num / ssr)
    } else {
        None
    };

    let params: Vec<f64> = beta.iter().copied().collect();

    let mut fit = OlsFit {
        params,
        std_errors: None,
        t_values: None,
        p_values: None,
        conf_int: None,
        residuals,
        n_obs: n,
        rank,
        df_model,
        df_resid,
        ssr,
        r_squared,
        adj_r_squared: None,
        f_statistic: None,
        f_pvalue: None,
        log_likelihood,
        aic,
        bic,
        durbin_watson,
    };

    if df_resid == 0 {
        return Ok(fit);
    }

    let dfr = df_resid as f64;
    let sigma2 = ssr / dfr;
    let cov_diag = unscaled_cov_diagonal(&svd, tol, k)?;
    let std_errors: Vec<f64> = cov_diag.iter().map(|d| (sigma2 * d).sqrt()).collect();
    let t_values: Vec<f64> = fit
        .params
        .iter()
        .zip(&std_errors)
        .map(|(b, se)| b / se)
        .collect();

    let t_dist = StudentsT::new(0.0, 1.0, dfr)
        .map_err(|e| AppError::Numerical(format!("Student t distribution: {e}")))?;
    let p_values: Vec<f64> = t_values
        .iter()
        .map(|t| if t.is_nan() { f64::NAN } else { 2.0 * t_dist.sf(t.abs()) })
        .collect();
    let t_crit = t_dist.inverse_cdf(1.0 - (1.0 - CONFIDENCE_LEVEL) / 2.0);
    let conf_int: Vec<(f64, f64)> = fit
        .params
        .iter()
        .zip(&std_errors)
        .map(|(b, se)| (b - t_crit * se, b + t_crit * se))
        .collect();

    fit.adj_r_squared = Some(1.0 - (1.0 - r_squared) * (nf - 1.0) / dfr);
    if df_model > 0 {
        let f = (ess / df_model as f64) / sigma2;
        fit.f_statistic = Some(f);
        fit.f_pvalue = FisherSnedecor::new(df_model as f64, dfr)
            .ok()
            .map(|dist| if f.is_finite() { dist.sf(f) } else { 0.0 });
    }
    fit.std_errors = Some(std_errors);
    fit.t_values = Some(t_values);
    fit.p_values = Some(p_values);
    fit.conf_int = Some(conf_int);

    Ok(fit)
}

/// Diagonal of `(XᵀX)⁺` from an SVD of `X`.
fn unscaled_cov_diagonal(svd: &Svd, tol: f64, k: usize) -> Result<Vec<f64>, AppError> {
    let v_t = svd
        .v_t
        .as_ref()
        .ok_or_else(|| AppError::Numerical("SVD did not produce right singular vectors.".to_string()))?;

    let mut diag = vec![0.0; k];
    for (r, &s) in svd.singular_values.iter().enumerate() {
        if s <= tol {
            continue;
        }
        let inv_s2 = 1.0 / (s * s);
        for (j, d) in diag.iter_mut().enumerate() {
            let v = v_t[(r, j)];
            *d += v * v * inv_s2;
        }
    }
    Ok(diag)
}
