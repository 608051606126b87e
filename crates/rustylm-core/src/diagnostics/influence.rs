//! Influence measures built on the hat values.

use ndarray::Array1;

/// Cook's distance
///
/// ```text
/// Dᵢ = (rᵢ / (1 - hᵢ))² · hᵢ / (scale · p)
/// ```
///
/// with rᵢ a (Pearson / weighted) residual.
pub fn cooks_distance(
    residuals: &Array1<f64>,
    leverage: &Array1<f64>,
    scale: f64,
    n_params: usize,
) -> Array1<f64> {
    residuals
        .iter()
        .zip(leverage.iter())
        .map(|(&r, &h)| {
            if h >= 1.0 - 1e-10 {
                return f64::NAN;
            }
            (r / (1.0 - h)).powi(2) * h / (scale * n_params as f64)
        })
        .collect()
}

/// σ̂ re-estimated with each observation deleted:
///
/// ```text
/// σ̂₍ᵢ₎² = (Σ rⱼ² - rᵢ² / (1 - hᵢ)) / (df - 1)
/// ```
pub fn leave_one_out_sigma(
    residuals: &Array1<f64>,
    leverage: &Array1<f64>,
    df_residual: f64,
) -> Array1<f64> {
    let total: f64 = residuals.iter().map(|r| r * r).sum();
    residuals
        .iter()
        .zip(leverage.iter())
        .map(|(&r, &h)| {
            if df_residual <= 1.0 || h >= 1.0 - 1e-10 {
                return f64::NAN;
            }
            ((total - r * r / (1.0 - h)).max(0.0) / (df_residual - 1.0)).sqrt()
        })
        .collect()
}
