//! Gamma family: V(μ) = μ², canonical inverse link (log is common in practice).

use ndarray::Array1;
use statrs::function::gamma::ln_gamma;

use super::{check_response, Family};
use crate::constants::MU_MIN_POSITIVE;
use crate::error::Result;
use crate::links::{InverseLink, Link};

#[derive(Debug, Clone, Copy, Default)]
pub struct GammaFamily;

impl Family for GammaFamily {
    fn name(&self) -> &str {
        "gamma"
    }

    fn variance(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| m * m)
    }

    /// d(y, μ) = 2[-log(y/μ) + (y - μ)/μ]
    fn unit_deviance(&self, y: f64, mu: f64) -> f64 {
        2.0 * (-(y / mu).ln() + (y - mu) / mu)
    }

    fn default_link(&self) -> Box<dyn Link> {
        Box::new(InverseLink)
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

    /// Gamma density with shape 1/φ and scale μφ, weighted.
    fn log_likelihood(
        &self,
        y: &Array1<f64>,
        mu: &Array1<f64>,
        phi: f64,
        weights: &Array1<f64>,
    ) -> f64 {
        let shape = 1.0 / phi;
        y.iter()
            .zip(mu.iter())
            .zip(weights.iter())
            .map(|((&yi, &mi), &w)| {
                let scale = mi * phi;
                w * ((shape - 1.0) * yi.ln() - yi / scale - ln_gamma(shape) - shape * scale.ln())
            })
            .sum()
    }

    fn validate_response(&self, y: &Array1<f64>) -> Result<()> {
        check_response(y, "gamma", "positive responses", |v| v.is_finite() && v > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_exponential_special_case() {
        // φ = 1 is the exponential distribution: log f(y) = -log μ - y/μ
        let ll = GammaFamily.log_likelihood(&array![2.0], &array![4.0], 1.0, &array![1.0]);
        assert_abs_diff_eq!(ll, -(4.0f64).ln() - 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_rejects_zero() {
        assert!(GammaFamily.validate_response(&array![1.0, 0.0]).is_err());
    }
}
