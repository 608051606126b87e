// =============================================================================
// IRLS: Iteratively Reweighted Least Squares
// =============================================================================
//
// The fitting loop behind every GLM:
//
//     Start with μ⁰ from the family's initializer, η⁰ = g(μ⁰)
//     Repeat:
//         1. Working weights   Wᵢ = pᵢ / (V(μᵢ) · g'(μᵢ)²)
//         2. Working response  zᵢ = (ηᵢ - offsetᵢ) + (yᵢ - μᵢ) · g'(μᵢ)
//         3. Weighted least squares of z on X with weights W
//         4. η = Xβ + offset, μ = g⁻¹(η)
//         5. Stop once the deviance no longer moves
//
// pᵢ are prior weights. Step 3 goes through the QR solver, so the final
// iteration also hands back (X'WX)⁻¹ and the weighted leverages.
//
// STEP HALVING
// ------------
// Non-canonical links (inverse link for Gamma, identity for Poisson) can step
// outside the valid mean space. When that happens, or the deviance becomes
// non-finite, the step is halved back towards the previous β.
//
// CONVERGENCE
// -----------
//     |D_new - D_old| / (|D_new| + 0.1) < tolerance
//
// Failure to converge is reported (`converged = false`) and logged, not
// treated as an error. Separation in logistic regression is the usual cause.
//
// =============================================================================

use ndarray::{Array1, Array2};
use serde::Deserialize;
use tracing::{debug, warn};

use super::initialize_mu_safe;
use super::ols::solve_least_squares;
use crate::constants::MAX_IRLS_WEIGHT;
use crate::error::{Result, RustyLmError};
use crate::families::Family;
use crate::links::Link;

const MAX_STEP_HALVINGS: usize = 20;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration options for the IRLS algorithm.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IRLSConfig {
    /// Maximum number of iterations before giving up.
    pub max_iterations: usize,

    /// Convergence tolerance on the relative deviance change.
    pub tolerance: f64,

    /// Working weights are clipped from below at this value.
    pub min_weight: f64,
}

impl Default for IRLSConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
            min_weight: 1e-10,
        }
    }
}

// =============================================================================
// Result Structure
// =============================================================================

/// Results from fitting a GLM using IRLS.
#[derive(Debug, Clone)]
pub struct IRLSResult {
    /// β̂
    pub coefficients: Array1<f64>,

    /// μ = g⁻¹(Xβ + offset)
    pub fitted_values: Array1<f64>,

    /// η = Xβ + offset
    pub linear_predictor: Array1<f64>,

    /// Σ pᵢ d(yᵢ, μᵢ)
    pub deviance: f64,

    pub iterations: usize,

    pub converged: bool,

    /// (X'WX)⁻¹ at the final working weights
    pub covariance_unscaled: Array2<f64>,

    /// Final working weights W (prior weights included)
    pub working_weights: Array1<f64>,

    /// Diagonal of the weighted hat matrix W^½X(X'WX)⁻¹X'W^½
    pub leverage: Array1<f64>,

    pub prior_weights: Array1<f64>,

    pub offset: Array1<f64>,
}

// =============================================================================
// Main Fitting Function
// =============================================================================

/// Fit a GLM with no offset and unit prior weights.
pub fn fit_glm(
    y: &Array1<f64>,
    x: &Array2<f64>,
    family: &dyn Family,
    link: &dyn Link,
    config: &IRLSConfig,
) -> Result<IRLSResult> {
    fit_glm_full(y, x, family, link, config, None, None)
}

/// Fit a GLM using Iteratively Reweighted Least Squares.
///
/// # Arguments
/// * `y` - Response variable (n)
/// * `x` - Design matrix (n × p), including the intercept column if wanted
/// * `family` - Error distribution
/// * `link` - Link function
/// * `config` - Iteration controls
/// * `offset` - Optional known component of η
/// * `weights` - Optional prior weights (binomial: number of trials)
///
/// # Errors
/// Shape mismatches, negative weights, an empty problem and rank-deficient
/// designs are errors. Non-convergence is not.
pub fn fit_glm_full(
    y: &Array1<f64>,
    x: &Array2<f64>,
    family: &dyn Family,
    link: &dyn Link,
    config: &IRLSConfig,
    offset: Option<&Array1<f64>>,
    weights: Option<&Array1<f64>>,
) -> Result<IRLSResult> {
    // -------------------------------------------------------------------------
    // Validate inputs
    // -------------------------------------------------------------------------
    let n = y.len();
    let p = x.ncols();

    if x.nrows() != n {
        return Err(RustyLmError::DimensionMismatch(format!(
            "X has {} rows but y has {} elements",
            x.nrows(),
            n
        )));
    }
    if n == 0 {
        return Err(RustyLmError::EmptyInput("y is empty".to_string()));
    }
    if p == 0 {
        return Err(RustyLmError::EmptyInput("X has no columns".to_string()));
    }

    let offset_vec = match offset {
        Some(o) if o.len() != n => {
            return Err(RustyLmError::DimensionMismatch(format!(
                "offset has {} elements but y has {}",
                o.len(),
                n
            )));
        }
        Some(o) => o.clone(),
        None => Array1::zeros(n),
    };

    let prior_weights = match weights {
        Some(w) if w.len() != n => {
            return Err(RustyLmError::DimensionMismatch(format!(
                "weights has {} elements but y has {}",
                w.len(),
                n
            )));
        }
        Some(w) if w.iter().any(|&v| !(v >= 0.0) || !v.is_finite()) => {
            return Err(RustyLmError::InvalidValue(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        Some(w) => w.clone(),
        None => Array1::ones(n),
    };

    family.validate_response(y)?;

    // -------------------------------------------------------------------------
    // Starting values
    // -------------------------------------------------------------------------
    let mut mu = family.initialize_mu(y, &prior_weights);
    if !family.is_valid_mu(&mu) {
        mu = initialize_mu_safe(y, family);
    }
    let mut eta = link.link(&mu);
    let mut deviance = family.deviance(y, &mu, Some(&prior_weights));

    let mut coefficients: Option<Array1<f64>> = None;
    let mut converged = false;
    let mut iteration = 0;

    let mut covariance_unscaled = Array2::zeros((p, p));
    let mut working_weights = Array1::zeros(n);
    let mut leverage = Array1::zeros(n);

    while iteration < config.max_iterations {
        iteration += 1;

        let link_deriv = link.derivative(&mu);
        let variance = family.variance(&mu);

        let weights_now: Array1<f64> = prior_weights
            .iter()
            .zip(variance.iter().zip(link_deriv.iter()))
            .map(|(&pw, (&v, &d))| {
                if pw == 0.0 {
                    0.0
                } else {
                    pw * (1.0 / (v * d * d)).clamp(config.min_weight, MAX_IRLS_WEIGHT)
                }
            })
            .collect();

        let working_response: Array1<f64> = (0..n)
            .map(|i| (eta[i] - offset_vec[i]) + (y[i] - mu[i]) * link_deriv[i])
            .collect();

        let solution = solve_least_squares(x, &working_response, Some(&weights_now))?;

        // ---------------------------------------------------------------------
        // Update, halving the step if μ leaves the family's domain
        // ---------------------------------------------------------------------
        let mut beta = solution.coefficients;
        let mut halvings = 0;
        let (new_eta, new_mu, new_deviance) = loop {
            let candidate_eta = x.dot(&beta) + &offset_vec;
            let candidate_mu = link.inverse(&candidate_eta);
            let candidate_dev = family.deviance(y, &candidate_mu, Some(&prior_weights));

            let usable = candidate_dev.is_finite() && family.is_valid_mu(&candidate_mu);
            match (&coefficients, usable) {
                (_, true) => break (candidate_eta, family.clamp_mu(&candidate_mu), candidate_dev),
                (Some(prev), false) if halvings < MAX_STEP_HALVINGS => {
                    halvings += 1;
                    beta = (&beta + prev) / 2.0;
                }
                _ => {
                    let clamped = family.clamp_mu(&candidate_mu);
                    let dev = family.deviance(y, &clamped, Some(&prior_weights));
                    if !dev.is_finite() {
                        return Err(RustyLmError::InvalidValue(format!(
                            "{} family with {} link produced an invalid mean; try another link",
                            family.name(),
                            link.name()
                        )));
                    }
                    break (candidate_eta, clamped, dev);
                }
            }
        };
        if halvings > 0 {
            debug!(iteration, halvings, "IRLS step halved");
        }

        eta = new_eta;
        mu = new_mu;
        let deviance_old = deviance;
        deviance = new_deviance;
        coefficients = Some(beta);

        covariance_unscaled = solution.covariance_unscaled;
        working_weights = weights_now;
        leverage = solution.leverage;

        let rel_change = (deviance - deviance_old).abs() / (deviance.abs() + 0.1);
        debug!(iteration, deviance, rel_change, "IRLS iteration");

        if rel_change < config.tolerance {
            converged = true;
            break;
        }
    }

    if !converged {
        warn!(
            iterations = iteration,
            deviance, "IRLS did not converge; estimates may be unreliable"
        );
    }

    let coefficients = coefficients.ok_or_else(|| {
        RustyLmError::InvalidValue("max_iterations must be at least 1".to_string())
    })?;

    Ok(IRLSResult {
        coefficients,
        fitted_values: mu,
        linear_predictor: eta,
        deviance,
        iterations: iteration,
        converged,
        covariance_unscaled,
        working_weights,
        leverage,
        prior_weights,
        offset: offset_vec,
    })
}

// =============================================================================
// Tests
// =============================================================================
