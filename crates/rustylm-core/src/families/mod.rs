// =============================================================================
// Distribution Families (Exponential Dispersion Models)
// =============================================================================
//
// Every family here is an exponential dispersion model (EDM):
//
//     f(y; θ, φ) = a(y, φ) · exp[(y·θ - b(θ)) / φ]
//
// where θ is the natural parameter and φ the dispersion. Two facts make EDMs
// convenient for regression:
//
//   - the mean is μ = b'(θ)
//   - the variance is Var(Y) = φ · V(μ), with V(μ) = b''(θ)
//
// So a family is fully characterised (for fitting purposes) by its VARIANCE
// FUNCTION V(μ). The unit deviance d(y, μ) measures how far y is from μ on the
// family's own scale; summed over observations it gives the deviance, which
// plays the role the residual sum of squares plays for the Normal model.
//
//     Family            V(μ)        φ          typical data
//     Gaussian          1           σ²         continuous, symmetric
//     Poisson           μ           1 (fixed)  counts
//     Binomial          μ(1-μ)      1 (fixed)  proportions / binary
//     Gamma             μ²          1/shape    positive, right-skewed
//     InverseGaussian   μ³          λ⁻¹        positive, very skewed
//
// =============================================================================

mod binomial;
mod gamma;
mod gaussian;
mod inverse_gaussian;
mod poisson;

pub use binomial::BinomialFamily;
pub use gamma::GammaFamily;
pub use gaussian::GaussianFamily;
pub use inverse_gaussian::InverseGaussianFamily;
pub use poisson::PoissonFamily;

use ndarray::Array1;

use crate::error::{Result, RustyLmError};
use crate::links::Link;

/// An exponential dispersion model used as a GLM response distribution.
pub trait Family: Send + Sync {
    /// Name as used on the command line and in summaries.
    fn name(&self) -> &str;

    /// Variance function V(μ); Var(Y) = φ · V(μ).
    fn variance(&self, mu: &Array1<f64>) -> Array1<f64>;

    /// Unit deviance d(y, μ) for one observation.
    fn unit_deviance(&self, y: f64, mu: f64) -> f64;

    /// Total deviance Σ wᵢ d(yᵢ, μᵢ).
    fn deviance(&self, y: &Array1<f64>, mu: &Array1<f64>, weights: Option<&Array1<f64>>) -> f64 {
        match weights {
            Some(w) => y
                .iter()
                .zip(mu.iter())
                .zip(w.iter())
                .map(|((&yi, &mi), &wi)| wi * self.unit_deviance(yi, mi))
                .sum(),
            None => y
                .iter()
                .zip(mu.iter())
                .map(|(&yi, &mi)| self.unit_deviance(yi, mi))
                .sum(),
        }
    }

    /// Canonical link.
    fn default_link(&self) -> Box<dyn Link>;

    /// Starting values for μ in IRLS.
    fn initialize_mu(&self, y: &Array1<f64>, weights: &Array1<f64>) -> Array1<f64>;

    /// Whether every μ lies inside the family's parameter space.
    fn is_valid_mu(&self, mu: &Array1<f64>) -> bool;

    /// Pull μ back inside the parameter space.
    fn clamp_mu(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.clone()
    }

    /// True when φ is known to be 1 (Poisson, Binomial).
    fn dispersion_is_fixed(&self) -> bool {
        false
    }

    /// Log-likelihood at fitted means `mu` and dispersion `phi`.
    fn log_likelihood(
        &self,
        y: &Array1<f64>,
        mu: &Array1<f64>,
        phi: f64,
        weights: &Array1<f64>,
    ) -> f64;

    /// Reject responses outside the family's support.
    fn validate_response(&self, y: &Array1<f64>) -> Result<()>;
}

/// Shared check used by the `validate_response` implementations.
pub(crate) fn check_response(
    y: &Array1<f64>,
    family: &str,
    requirement: &str,
    ok: impl Fn(f64) -> bool,
) -> Result<()> {
    match y.iter().position(|&v| !ok(v)) {
        Some(i) => Err(RustyLmError::InvalidValue(format!(
            "{} family requires {}; observation {} is {}",
            family,
            requirement,
            i + 1,
            y[i]
        ))),
        None => Ok(()),
    }
}

/// y·log(y/μ) with the convention 0·log(0) = 0.
#[inline]
pub(crate) fn ylogy(y: f64, mu: f64) -> f64 {
    if y > 0.0 {
        y * (y / mu).ln()
    } else {
        0.0
    }
}

/// Get a Family trait object from a family name string.
///
/// Handles case-insensitive matching and common aliases.
pub fn family_from_name(name: &str) -> Result<Box<dyn Family>> {
    match name.to_lowercase().as_str() {
        "gaussian" | "normal" => Ok(Box::new(GaussianFamily)),
        "poisson" => Ok(Box::new(PoissonFamily)),
        "binomial" => Ok(Box::new(BinomialFamily)),
        "gamma" => Ok(Box::new(GammaFamily)),
        "inverse_gaussian" | "inverse.gaussian" | "inversegaussian" | "ig" => {
            Ok(Box::new(InverseGaussianFamily))
        }
        _ => Err(RustyLmError::InvalidValue(format!(
            "Unknown family '{}'. Use 'gaussian', 'poisson', 'binomial', 'gamma', \
             or 'inverse_gaussian'.",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_unit_deviance_zero_at_mean() {
        let families: Vec<Box<dyn Family>> = vec![
            Box::new(GaussianFamily),
            Box::new(PoissonFamily),
            Box::new(BinomialFamily),
            Box::new(GammaFamily),
            Box::new(InverseGaussianFamily),
        ];
        for fam in families {
            assert_abs_diff_eq!(fam.unit_deviance(0.4, 0.4), 0.0, epsilon = 1e-12);
            assert!(fam.unit_deviance(0.4, 0.6) > 0.0, "{}", fam.name());
        }
    }

    #[test]
    fn test_weighted_deviance() {
        let y = array![1.0, 2.0];
        let mu = array![0.0, 0.0];
        let w = array![2.0, 0.5];
        assert_abs_diff_eq!(GaussianFamily.deviance(&y, &mu, Some(&w)), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(GaussianFamily.deviance(&y, &mu, None), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_canonical_links() {
        assert_eq!(GaussianFamily.default_link().name(), "identity");
        assert_eq!(PoissonFamily.default_link().name(), "log");
        assert_eq!(BinomialFamily.default_link().name(), "logit");
        assert_eq!(GammaFamily.default_link().name(), "inverse");
        assert_eq!(InverseGaussianFamily.default_link().name(), "1/mu^2");
    }

    #[test]
    fn test_family_from_name() {
        assert_eq!(family_from_name("Normal").unwrap().name(), "gaussian");
        assert_eq!(family_from_name("IG").unwrap().name(), "inverse_gaussian");
        assert!(family_from_name("tweedie").is_err());
    }

    #[test]
    fn test_ylogy_zero_convention() {
        assert_eq!(ylogy(0.0, 3.0), 0.0);
        assert_abs_diff_eq!(ylogy(2.0, 1.0), 2.0 * 2f64.ln(), epsilon = 1e-12);
    }
}
