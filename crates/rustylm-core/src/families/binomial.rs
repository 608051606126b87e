//! Binomial family: V(μ) = μ(1 - μ), φ fixed at 1, canonical logit link.
//!
//! The response is a proportion in [0, 1]. For grouped data pass the number
//! of trials as the prior weight; binary data uses weight 1.

use ndarray::Array1;
use statrs::function::gamma::ln_gamma;

use super::{check_response, ylogy, Family};
use crate::constants::{MU_MAX_PROBABILITY, MU_MIN_PROBABILITY};
use crate::error::Result;
use crate::links::{Link, LogitLink};

#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialFamily;

fn ln_choose(n: f64, k: f64) -> f64 {
    ln_gamma(n + 1.0) - ln_gamma(k + 1.0) - ln_gamma(n - k + 1.0)
}

impl Family for BinomialFamily {
    fn name(&self) -> &str {
        "binomial"
    }

    fn variance(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| m * (1.0 - m))
    }

    /// d(y, μ) = 2[y log(y/μ) + (1-y) log((1-y)/(1-μ))]
    fn unit_deviance(&self, y: f64, mu: f64) -> f64 {
        2.0 * (ylogy(y, mu) + ylogy(1.0 - y, 1.0 - mu))
    }

    fn default_link(&self) -> Box<dyn Link> {
        Box::new(LogitLink)
    }

    fn initialize_mu(&self, y: &Array1<f64>, weights: &Array1<f64>) -> Array1<f64> {
        y.iter()
            .zip(weights.iter())
            .map(|(&yi, &w)| (w * yi + 0.5) / (w + 1.0))
            .collect()
    }

    fn is_valid_mu(&self, mu: &Array1<f64>) -> bool {
        mu.iter().all(|&m| m > 0.0 && m < 1.0)
    }

    fn clamp_mu(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| m.clamp(MU_MIN_PROBABILITY, MU_MAX_PROBABILITY))
    }

    fn dispersion_is_fixed(&self) -> bool {
        true
    }

    /// ℓ = Σ [log C(mᵢ, mᵢyᵢ) + mᵢyᵢ log μᵢ + mᵢ(1-yᵢ) log(1-μᵢ)], mᵢ = trials
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
            .filter(|&(_, &m)| m > 0.0)
            .map(|((&yi, &mi), &m)| {
                let successes = (m * yi).round();
                let failures = m - successes;
                let mut ll = ln_choose(m, successes);
                if successes > 0.0 {
                    ll += successes * mi.ln();
                }
                if failures > 0.0 {
                    ll += failures * (1.0 - mi).ln();
                }
                ll
            })
            .sum()
    }

    fn validate_response(&self, y: &Array1<f64>) -> Result<()> {
        check_response(y, "binomial", "proportions in [0, 1]", |v| {
            (0.0..=1.0).contains(&v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_bernoulli_log_likelihood() {
        let ll = BinomialFamily.log_likelihood(
            &array![1.0, 0.0],
            &array![0.8, 0.8],
            1.0,
            &array![1.0, 1.0],
        );
        assert_abs_diff_eq!(ll, 0.8f64.ln() + 0.2f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_grouped_log_likelihood() {
        // 3 successes out of 4 at p = 0.5: C(4,3) / 16
        let ll = BinomialFamily.log_likelihood(&array![0.75], &array![0.5], 1.0, &array![4.0]);
        assert_abs_diff_eq!(ll, (4.0f64 / 16.0).ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_clamp_keeps_inside_unit_interval() {
        let mu = BinomialFamily.clamp_mu(&array![0.0, 1.0, 0.5]);
        assert!(BinomialFamily.is_valid_mu(&mu));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(BinomialFamily.validate_response(&array![0.5, 1.5]).is_err());
    }
}
