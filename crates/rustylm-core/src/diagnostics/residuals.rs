//! Residual types.
//!
//! | name         | definition                              |
//! |--------------|-----------------------------------------|
//! | response     | y - μ                                   |
//! | Pearson      | √w (y - μ) / √V(μ)                      |
//! | deviance     | sign(y - μ) √(w d(y, μ))                |
//! | working      | (y - μ) g'(μ)                           |
//! | standardized | r / √(φ (1 - h))                        |
//! | studentized  | standardized, with φ re-estimated       |
//! |              | leaving the observation out             |

use ndarray::Array1;

use crate::families::Family;
use crate::links::Link;

pub fn resid_response(y: &Array1<f64>, mu: &Array1<f64>) -> Array1<f64> {
    y - mu
}

pub fn resid_pearson(
    y: &Array1<f64>,
    mu: &Array1<f64>,
    family: &dyn Family,
    weights: &Array1<f64>,
) -> Array1<f64> {
    let variance = family.variance(mu);
    (0..y.len())
        .map(|i| (y[i] - mu[i]) * weights[i].sqrt() / variance[i].sqrt())
        .collect()
}

pub fn resid_deviance(
    y: &Array1<f64>,
    mu: &Array1<f64>,
    family: &dyn Family,
    weights: &Array1<f64>,
) -> Array1<f64> {
    (0..y.len())
        .map(|i| {
            let d = (weights[i] * family.unit_deviance(y[i], mu[i])).max(0.0);
            (y[i] - mu[i]).signum() * d.sqrt()
        })
        .collect()
}

pub fn resid_working(y: &Array1<f64>, mu: &Array1<f64>, link: &dyn Link) -> Array1<f64> {
    let deriv = link.derivative(mu);
    (0..y.len()).map(|i| (y[i] - mu[i]) * deriv[i]).collect()
}

/// r / √(scale · (1 - h)). Points with h ≈ 1 get NaN.
pub fn standardized_residuals(
    residuals: &Array1<f64>,
    leverage: &Array1<f64>,
    scale: f64,
) -> Array1<f64> {
    residuals
        .iter()
        .zip(leverage.iter())
        .map(|(&r, &h)| {
            let denom = (scale * (1.0 - h)).sqrt();
            if denom > 0.0 && h < 1.0 - 1e-10 {
                r / denom
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Externally studentized from internally standardized residuals:
///
/// ```text
/// tᵢ = rᵢ √((df - 1) / (df - rᵢ²))
/// ```
///
/// which equals eᵢ / (σ̂₍ᵢ₎ √(1 - hᵢ)) without refitting.
pub fn studentized_residuals(standardized: &Array1<f64>, df_residual: f64) -> Array1<f64> {
    standardized.mapv(|r| {
        let denom = df_residual - r * r;
        if df_residual > 1.0 && denom > 0.0 {
            r * ((df_residual - 1.0) / denom).sqrt()
        } else {
            f64::NAN
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::{GaussianFamily, PoissonFamily};
    use crate::links::LogLink;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_gaussian_residuals_coincide() {
        let y = array![1.0, 2.0, 4.0];
        let mu = array![1.5, 2.0, 3.0];
        let w = Array1::ones(3);
        let response = resid_response(&y, &mu);
        let pearson = resid_pearson(&y, &mu, &GaussianFamily, &w);
        let deviance = resid_deviance(&y, &mu, &GaussianFamily, &w);
        for i in 0..3 {
            assert_abs_diff_eq!(response[i], pearson[i], epsilon = 1e-12);
            assert_abs_diff_eq!(response[i], deviance[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_poisson_pearson() {
        let r = resid_pearson(&array![6.0], &array![4.0], &PoissonFamily, &array![1.0]);
        assert_abs_diff_eq!(r[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_working_residuals_log_link() {
        let r = resid_working(&array![6.0], &array![4.0], &LogLink);
        assert_abs_diff_eq!(r[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_studentized_exceeds_standardized_for_outliers() {
        let std = array![0.5, 2.5];
        let stud = studentized_residuals(&std, 10.0);
        assert!(stud[0].abs() < 0.5);
        assert!(stud[1] > 2.5);
    }

    #[test]
    fn test_full_leverage_gives_nan() {
        let r = standardized_residuals(&array![0.0], &array![1.0], 1.0);
        assert!(r[0].is_nan());
    }
}
