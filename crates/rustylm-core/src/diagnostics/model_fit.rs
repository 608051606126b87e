//! Likelihood-based measures of fit.

use std::f64::consts::PI;

use ndarray::Array1;

use crate::families::Family;

/// Gaussian log-likelihood at the ML estimate σ̂² = RSS / n:
///
/// ```text
/// ℓ = ½ [Σ log wᵢ - n (log 2π + 1 - log n + log RSS)]
/// ```
pub fn log_likelihood_normal_ml(rss: f64, n: usize, sum_log_weights: f64) -> f64 {
    let n = n as f64;
    0.5 * (sum_log_weights - n * ((2.0 * PI).ln() + 1.0 - n.ln() + rss.ln()))
}

/// Restricted (REML) log-likelihood of a linear model.
///
/// The ML formula with n replaced by N = n - p, minus log|det R| from the QR
/// factorisation of √W·X:
///
/// ```text
/// ℓ_R = ½ [Σ log wᵢ - N (log 2π + 1 - log N + log RSS)] - Σ log|R_jj|
/// ```
pub fn log_likelihood_normal_reml(
    rss: f64,
    n: usize,
    p: usize,
    sum_log_weights: f64,
    log_abs_det_r: f64,
) -> f64 {
    let big_n = n.saturating_sub(p) as f64;
    0.5 * (sum_log_weights - big_n * ((2.0 * PI).ln() + 1.0 - big_n.ln() + rss.ln()))
        - log_abs_det_r
}

/// AIC = -2ℓ + 2k
pub fn aic(log_likelihood: f64, n_params: usize) -> f64 {
    -2.0 * log_likelihood + 2.0 * n_params as f64
}

/// BIC = -2ℓ + k log n
pub fn bic(log_likelihood: f64, n_params: usize, n_obs: usize) -> f64 {
    -2.0 * log_likelihood + n_params as f64 * (n_obs as f64).ln()
}

/// Deviance of the intercept-only model: every μᵢ is the weighted mean of y.
pub fn null_deviance(y: &Array1<f64>, family: &dyn Family, weights: &Array1<f64>) -> f64 {
    let total_weight: f64 = weights.sum();
    let mean = if total_weight > 0.0 {
        y.iter().zip(weights.iter()).map(|(&yi, &w)| yi * w).sum::<f64>() / total_weight
    } else {
        y.mean().unwrap_or(0.0)
    };
    let mu = family.clamp_mu(&Array1::from_elem(y.len(), mean));
    family.deviance(y, &mu, Some(weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::{GaussianFamily, PoissonFamily};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_ml_log_likelihood_equals_density_sum() {
        // Residuals 1, -1 around μ: σ̂² = 1
        let ll = log_likelihood_normal_ml(2.0, 2, 0.0);
        let density_sum = 2.0 * (-0.5 * (2.0 * PI).ln() - 0.5);
        assert_abs_diff_eq!(ll, density_sum, epsilon = 1e-12);
    }

    #[test]
    fn test_reml_reduces_to_ml_shape() {
        // With log|R| = 0 REML is ML evaluated at N = n - p
        let reml = log_likelihood_normal_reml(3.0, 5, 2, 0.0, 0.0);
        assert_abs_diff_eq!(reml, log_likelihood_normal_ml(3.0, 3, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_information_criteria() {
        assert_abs_diff_eq!(aic(-10.0, 3), 26.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bic(-10.0, 3, 100), 20.0 + 3.0 * 100f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_gaussian_null_deviance_is_tss() {
        let y = array![1.0, 2.0, 6.0];
        let dev = null_deviance(&y, &GaussianFamily, &Array1::ones(3));
        assert_abs_diff_eq!(dev, 14.0, epsilon = 1e-12);
    }

    #[test]
    fn test_poisson_null_deviance_weighted_mean() {
        let y = array![1.0, 3.0];
        let w = array![1.0, 1.0];
        let dev = null_deviance(&y, &PoissonFamily, &w);
        let expected = 2.0 * ((1.0f64 / 2.0).ln() + 3.0 * (3.0f64 / 2.0).ln());
        assert_abs_diff_eq!(dev, expected, epsilon = 1e-12);
    }
}
