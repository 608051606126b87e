//! Poisson family for counts: V(μ) = μ, φ fixed at 1, canonical log link.

use ndarray::Array1;
use statrs::function::gamma::ln_gamma;

use super::{check_response, ylogy, Family};
use crate::constants::MU_MIN_POSITIVE;
use crate::error::Result;
use crate::links::{Link, LogLink};

#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonFamily;

impl Family for PoissonFamily {
    fn name(&self) -> &str {
        "poisson"
    }

    fn variance(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.clone()
    }

    /// d(y, μ) = 2[y log(y/μ) - (y - μ)]
    fn unit_deviance(&self, y: f64, mu: f64) -> f64 {
        2.0 * (ylogy(y, mu) - (y - mu))
    }

    fn default_link(&self) -> Box<dyn Link> {
        Box::new(LogLink)
    }

    fn initialize_mu(&self, y: &Array1<f64>, _weights: &Array1<f64>) -> Array1<f64> {
        // Shift zeros away from the boundary so log(μ) is finite
        y.mapv(|yi| yi + 0.1)
    }

    fn is_valid_mu(&self, mu: &Array1<f64>) -> bool {
        mu.iter().all(|&m| m.is_finite() && m > 0.0)
    }

    fn clamp_mu(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| m.max(MU_MIN_POSITIVE))
    }

    fn dispersion_is_fixed(&self) -> bool {
        true
    }

    /// ℓ = Σ wᵢ [yᵢ log μᵢ - μᵢ - log Γ(yᵢ + 1)]
    fn log_likelihood(
        &self,
        y: &Array1<f64>,
        mu: &Array1<f64>,
        _phi: f64,
        weights: &Array1<f64>,
    ) -> f64 {
        y.iter()
            .zip(mu.iter())
            .zip(weights.iter())
            .map(|((&yi, &mi), &w)| {
                let y_log_mu = if yi > 0.0 { yi * mi.ln() } else { 0.0 };
                w * (y_log_mu - mi - ln_gamma(yi + 1.0))
            })
            .sum()
    }

    fn validate_response(&self, y: &Array1<f64>) -> Result<()> {
        check_response(y, "poisson", "non-negative responses", |v| {
            v.is_finite() && v >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_log_likelihood_known_value() {
        // P(Y = 2 | μ = 3) = e^-3 · 9 / 2
        let ll = PoissonFamily.log_likelihood(&array![2.0], &array![3.0], 1.0, &array![1.0]);
        let expected = (-3.0f64).exp() * 9.0 / 2.0;
        assert_abs_diff_eq!(ll, expected.ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_zero_count_deviance() {
        // y = 0: d = 2μ
        assert_abs_diff_eq!(PoissonFamily.unit_deviance(0.0, 1.5), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_negative_counts() {
        assert!(PoissonFamily.validate_response(&array![1.0, -1.0]).is_err());
    }
}
