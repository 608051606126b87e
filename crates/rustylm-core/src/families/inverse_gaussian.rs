//! Inverse Gaussian family: V(μ) = μ³, canonical link 1/μ².

use std::f64::consts::PI;

use ndarray::Array1;

use super::{check_response, Family};
use crate::constants::MU_MIN_POSITIVE;
use crate::error::Result;
use crate::links::{InverseSquaredLink, Link};

#[derive(Debug, Clone, Copy, Default)]
pub struct InverseGaussianFamily;

impl Family for InverseGaussianFamily {
    fn name(&self) -> &str {
        "inverse_gaussian"
    }

    fn variance(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| m * m * m)
    }

    /// d(y, μ) = (y - μ)² / (μ² y)
    fn unit_deviance(&self, y: f64, mu: f64) -> f64 {
        (y - mu).powi(2) / (mu * mu * y)
    }

    fn default_link(&self) -> Box<dyn Link> {
        Box::new(InverseSquaredLink)
    }

    fn initialize_mu(&self, y: &Array1<f64>, _weights: &Array1<f64>) -> Array1<f64> {
        y.clone()
    }

    fn is_valid_mu(&self, mu: &Array1<f64>) -> bool {
        mu.iter().all(|&m| m.is_finite() && m > 0.0)
    }

    fn clamp_mu(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| m.max(MU_MIN_POSITIVE))
    }

    /// ℓ = -½ Σ wᵢ [log(2πφyᵢ³) + (yᵢ - μᵢ)² / (φ μᵢ² yᵢ)]
    fn log_likelihood(
        &self,
        y: &Array1<f64>,
        mu: &Array1<f64>,
        phi: f64,
        weights: &Array1<f64>,
    ) -> f64 {
        -0.5 * y
            .iter()
            .zip(mu.iter())
            .zip(weights.iter())
            .map(|((&yi, &mi), &w)| {
                w * ((2.0 * PI * phi * yi.powi(3)).ln() + self.unit_deviance(yi, mi) / phi)
            })
            .sum::<f64>()
    }

    fn validate_response(&self, y: &Array1<f64>) -> Result<()> {
        check_response(y, "inverse_gaussian", "positive responses", |v| {
            v.is_finite() && v > 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_variance_is_cubic() {
        let v = InverseGaussianFamily.variance(&array![2.0]);
        assert_abs_diff_eq!(v[0], 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_log_likelihood_at_mean() {
        let ll = InverseGaussianFamily.log_likelihood(&array![1.0], &array![1.0], 1.0, &array![1.0]);
        assert_abs_diff_eq!(ll, -0.5 * (2.0 * PI).ln(), epsilon = 1e-12);
    }
}
