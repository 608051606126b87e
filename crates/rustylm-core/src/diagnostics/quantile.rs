//! Sample quantiles (R's default type 7).

/// Quantile p ∈ [0, 1] by linear interpolation between order statistics
/// x₍ₖ₎ at h = (n - 1)p. Non-finite values are ignored; empty input gives NaN.
pub fn quantile(data: &[f64], p: f64) -> f64 {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted_quantile(&sorted, p)
}

fn sorted_quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Min, lower quartile, median, upper quartile, max.
pub fn five_number_summary(data: &[f64]) -> [f64; 5] {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return [f64::NAN; 5];
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    [0.0, 0.25, 0.5, 0.75, 1.0].map(|p| sorted_quantile(&sorted, p))
}
