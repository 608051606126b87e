//! Estimators of the dispersion parameter φ.

use ndarray::Array1;

use crate::families::Family;

/// Pearson's χ² = Σ wᵢ (yᵢ - μᵢ)² / V(μᵢ).
pub fn pearson_chi2(
    y: &Array1<f64>,
    mu: &Array1<f64>,
    family: &dyn Family,
    weights: &Array1<f64>,
) -> f64 {
    let variance = family.variance(mu);
    (0..y.len())
        .map(|i| weights[i] * (y[i] - mu[i]).powi(2) / variance[i])
        .sum()
}

/// φ̂ = χ²_Pearson / df. This is the estimator GLM summaries use.
pub fn estimate_dispersion_pearson(
    y: &Array1<f64>,
    mu: &Array1<f64>,
    family: &dyn Family,
    weights: &Array1<f64>,
    df_residual: f64,
) -> f64 {
    if df_residual <= 0.0 {
        return f64::NAN;
    }
    pearson_chi2(y, mu, family, weights) / df_residual
}

/// φ̂ = D / df.
pub fn estimate_dispersion_deviance(deviance: f64, df_residual: f64) -> f64 {
    if df_residual <= 0.0 {
        return f64::NAN;
    }
    deviance / df_residual
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::{GaussianFamily, PoissonFamily};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_gaussian_pearson_is_rss() {
        let y = array![1.0, 2.0, 3.0];
        let mu = array![1.5, 2.0, 2.0];
        let w = Array1::ones(3);
        assert_abs_diff_eq!(pearson_chi2(&y, &mu, &GaussianFamily, &w), 1.25, epsilon = 1e-12);
        assert_abs_diff_eq!(
            estimate_dispersion_pearson(&y, &mu, &GaussianFamily, &w, 1.0),
            1.25,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_poisson_pearson() {
        let chi2 = pearson_chi2(&array![4.0, 1.0], &array![2.0, 1.0], &PoissonFamily, &array![1.0, 1.0]);
        assert_abs_diff_eq!(chi2, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_df_is_nan() {
        assert!(estimate_dispersion_deviance(1.0, 0.0).is_nan());
        assert_abs_diff_eq!(estimate_dispersion_deviance(6.0, 3.0), 2.0, epsilon = 1e-12);
    }
}
