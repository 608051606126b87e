//! Gaussian (Normal) family: V(μ) = 1, canonical identity link.
//!
//! With the identity link, maximising the Gaussian likelihood is the same
//! problem as minimising the residual sum of squares, so IRLS converges to
//! the OLS solution in a single step.

use std::f64::consts::PI;

use ndarray::Array1;

use super::{check_response, Family};
use crate::error::Result;
use crate::links::{IdentityLink, Link};

#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianFamily;

impl Family for GaussianFamily {
    fn name(&self) -> &str {
        "gaussian"
    }

    fn variance(&self, mu: &Array1<f64>) -> Array1<f64> {
        Array1::ones(mu.len())
    }

    fn unit_deviance(&self, y: f64, mu: f64) -> f64 {
        (y - mu).powi(2)
    }

    fn default_link(&self) -> Box<dyn Link> {
        Box::new(IdentityLink)
    }

    fn initialize_mu(&self, y: &Array1<f64>, _weights: &Array1<f64>) -> Array1<f64> {
        y.clone()
    }

    fn is_valid_mu(&self, mu: &Array1<f64>) -> bool {
        mu.iter().all(|m| m.is_finite())
    }

    /// ℓ = -½ Σ [log(2πφ/wᵢ) + wᵢ(yᵢ - μᵢ)²/φ], zero-weight rows excluded.
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
            .filter(|&(_, &w)| w > 0.0)
            .map(|((&yi, &mi), &w)| (2.0 * PI * phi / w).ln() + w * (yi - mi).powi(2) / phi)
            .sum::<f64>()
    }

    fn validate_response(&self, y: &Array1<f64>) -> Result<()> {
        check_response(y, "gaussian", "finite responses", f64::is_finite)
    }
}
