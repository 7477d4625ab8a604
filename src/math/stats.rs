//! Null-aware descriptive statistics over `Option<f64>` columns.
//!
//! Nulls are excluded from every statistic; a statistic that cannot be formed
//! from what is left comes back as `None`.

/// Mean of the non-null entries.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { None } else { Some(sum / n as f64) }
}

/// Population standard deviation (ddof = 0) of the non-null entries.
pub fn population_std(values: &[Option<f64>]) -> Option<f64> {
    let m = mean(values)?;
    let (ss, n) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + (v - m) * (v - m), n + 1));
    Some((ss / n as f64).sqrt())
}

/// Pearson correlation over pairwise-complete entries.
///
/// `None` with fewer than two complete pairs or when either side is constant.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    pearson_pairs(&pairs)
}

/// Pearson correlation of complete pairs.
pub fn pearson_pairs(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len();
    if n < 2 {
        return None;
    }

    let nf = n as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for &(a, b) in pairs {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let flat_x = sxx <= 0.0 || is_constant(pairs.iter().map(|p| p.0));
    let flat_y = syy <= 0.0 || is_constant(pairs.iter().map(|p| p.1));
    if flat_x || flat_y {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    // Rounding can push |r| a hair past 1.
    Some(r.clamp(-1.0, 1.0))
}

/// True when every value is bitwise-identical (empty counts as constant).
///
/// Checked explicitly because the mean of identical values need not equal them
/// exactly, which leaves a tiny non-zero spread.
pub fn is_constant(mut values: impl Iterator<Item = f64>) -> bool {
    let Some(first) = values.next() else {
        return true;
    };
    values.all(|v| v == first)
}

/// Count of pairwise-complete entries.
pub fn complete_pairs(x: &[Option<f64>], y: &[Option<f64>]) -> usize {
    x.iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_some() && b.is_some())
        .count()
}

/// Round half away from zero to `places` decimals.
pub fn round_to(v: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (v * scale).round() / scale
}
