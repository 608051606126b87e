// =============================================================================
// Link Functions
// =============================================================================
//
// A link function g connects the mean of the response to the linear predictor:
//
//     g(μ) = η = Xβ
//
// For ordinary linear regression g is the identity, so the coefficients act
// directly on the mean. For counts a log link keeps μ positive and makes the
// coefficients multiplicative; for proportions a logit link keeps μ in (0, 1).
//
// Each family has a CANONICAL link (the one that makes η equal the natural
// parameter θ of the exponential dispersion model):
//
//     Gaussian          identity     η = μ
//     Poisson           log          η = log μ
//     Binomial          logit        η = log(μ / (1 - μ))
//     Gamma             inverse      η = 1 / μ
//     Inverse Gaussian  1/mu^2       η = 1 / μ²
//
// =============================================================================

use ndarray::Array1;

use crate::error::{Result, RustyLmError};

/// A link function g with its inverse and derivative.
pub trait Link: Send + Sync {
    /// Name as used on the command line and in summaries.
    fn name(&self) -> &str;

    /// η = g(μ)
    fn link(&self, mu: &Array1<f64>) -> Array1<f64>;

    /// μ = g⁻¹(η)
    fn inverse(&self, eta: &Array1<f64>) -> Array1<f64>;

    /// dη/dμ = g'(μ)
    fn derivative(&self, mu: &Array1<f64>) -> Array1<f64>;
}

/// η = μ
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityLink;

impl Link for IdentityLink {
    fn name(&self) -> &str {
        "identity"
    }

    fn link(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.clone()
    }

    fn inverse(&self, eta: &Array1<f64>) -> Array1<f64> {
        eta.clone()
    }

    fn derivative(&self, mu: &Array1<f64>) -> Array1<f64> {
        Array1::ones(mu.len())
    }
}

/// η = log(μ)
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLink;

impl Link for LogLink {
    fn name(&self) -> &str {
        "log"
    }

    fn link(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(f64::ln)
    }

    fn inverse(&self, eta: &Array1<f64>) -> Array1<f64> {
        // Cap η so exp() cannot overflow to infinity
        eta.mapv(|e| e.min(700.0).exp())
    }

    fn derivative(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| 1.0 / m)
    }
}

/// η = log(μ / (1 - μ))
#[derive(Debug, Clone, Copy, Default)]
pub struct LogitLink;

impl Link for LogitLink {
    fn name(&self) -> &str {
        "logit"
    }

    fn link(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| (m / (1.0 - m)).ln())
    }

    fn inverse(&self, eta: &Array1<f64>) -> Array1<f64> {
        eta.mapv(|e| {
            // Numerically stable in both tails
            if e >= 0.0 {
                1.0 / (1.0 + (-e).exp())
            } else {
                let ex = e.exp();
                ex / (1.0 + ex)
            }
        })
    }

    fn derivative(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| 1.0 / (m * (1.0 - m)))
    }
}

/// η = 1 / μ
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseLink;

impl Link for InverseLink {
    fn name(&self) -> &str {
        "inverse"
    }

    fn link(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| 1.0 / m)
    }

    fn inverse(&self, eta: &Array1<f64>) -> Array1<f64> {
        eta.mapv(|e| 1.0 / e)
    }

    fn derivative(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| -1.0 / (m * m))
    }
}

/// η = 1 / μ²
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseSquaredLink;

impl Link for InverseSquaredLink {
    fn name(&self) -> &str {
        "1/mu^2"
    }

    fn link(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| 1.0 / (m * m))
    }

    fn inverse(&self, eta: &Array1<f64>) -> Array1<f64> {
        eta.mapv(|e| 1.0 / e.sqrt())
    }

    fn derivative(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.mapv(|m| -2.0 / (m * m * m))
    }
}

/// Get a Link trait object from a link name string.
/// Returns an error for unknown link names instead of silently defaulting.
pub fn link_from_name(name: &str) -> Result<Box<dyn Link>> {
    match name.to_lowercase().as_str() {
        "identity" => Ok(Box::new(IdentityLink)),
        "log" => Ok(Box::new(LogLink)),
        "logit" => Ok(Box::new(LogitLink)),
        "inverse" => Ok(Box::new(InverseLink)),
        "1/mu^2" | "inverse_squared" | "inverse-squared" => Ok(Box::new(InverseSquaredLink)),
        _ => Err(RustyLmError::InvalidValue(format!(
            "Unknown link '{}'. Use 'identity', 'log', 'logit', 'inverse', or '1/mu^2'.",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn all_links() -> Vec<Box<dyn Link>> {
        vec![
            Box::new(IdentityLink),
            Box::new(LogLink),
            Box::new(LogitLink),
            Box::new(InverseLink),
            Box::new(InverseSquaredLink),
        ]
    }

    #[test]
    fn test_inverse_undoes_link() {
        let mu = array![0.1, 0.4, 0.75];
        for link in all_links() {
            let back = link.inverse(&link.link(&mu));
            for (a, b) in back.iter().zip(mu.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let mu = array![0.3];
        let h = 1e-6;
        for link in all_links() {
            let up = link.link(&array![0.3 + h])[0];
            let down = link.link(&array![0.3 - h])[0];
            let numeric = (up - down) / (2.0 * h);
            assert_abs_diff_eq!(link.derivative(&mu)[0], numeric, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_logit_inverse_stable_in_tails() {
        let mu = LogitLink.inverse(&array![-800.0, 800.0]);
        assert!(mu[0] >= 0.0 && mu[0] < 1e-300);
        assert_eq!(mu[1], 1.0);
    }

    #[test]
    fn test_link_from_name() {
        assert_eq!(link_from_name("LOG").unwrap().name(), "log");
        assert!(link_from_name("probit").is_err());
    }
}
