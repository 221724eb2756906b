//! Descriptive statistics helpers
//!
//! Small, dependency-free numeric helpers used by the result aggregator:
//! mean, median, sample standard deviation, and linear-interpolated
//! quantiles. All of them return 0.0 on empty input so summary records stay
//! total; callers that must distinguish "no data" check counts first.

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median; 0.0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Sample standard deviation (n-1 denominator); 0.0 for fewer than two
/// values.
pub fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Linear-interpolated quantile for `q` in `[0, 1]`; 0.0 for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Round to one decimal place - the precision reviewer ratings are reported
/// at. Delta classification compares post-rounding, exactly.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
