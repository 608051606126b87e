// =============================================================================
// Regression Models
// =============================================================================
//
// The formula-level front end: parse → design matrix → solver → fit object.
//
//   lm   - linear model by least squares. Under Normal errors OLS is also the
//          maximum likelihood estimate of β; the two routes differ only in
//          how σ² is estimated:
//
//              ML:    σ̂² = RSS / n
//              REML:  σ̂² = RSS / (n - p)     (unbiased)
//
//   glm  - generalized linear model over an exponential dispersion family,
//          fitted by IRLS.
//
// Fit objects own their design matrix, so every accessor is a pure function
// of the fit.
//
// =============================================================================

mod glm;
mod lm;

pub use glm::{GeneralizedLinearModel, GlmFit, GlmOptions, GlmPrediction};
pub use lm::{FStatistic, LinearModel, LmFit, LmOptions, Prediction};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::data::DataFrame;
use crate::design_matrix::DesignMatrix;
use crate::error::{Result, RustyLmError};

/// How the residual variance of a linear model is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarianceMethod {
    /// RSS / (n - p)
    #[default]
    Reml,
    /// RSS / n
    Ml,
}

/// Which likelihood to evaluate at the fitted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikelihoodKind {
    Ml,
    Reml,
}

/// Interval type for linear-model predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    None,
    /// Interval for the mean response.
    Confidence,
    /// Interval for a new observation.
    Prediction,
}

/// Scale of GLM predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// η = Xβ + offset
    Link,
    /// μ = g⁻¹(η)
    #[default]
    Response,
}

/// Pull an optional numeric column (weights, offset) onto the design's rows.
fn aux_column(
    design: &DesignMatrix,
    data: &DataFrame,
    column: Option<&str>,
) -> Result<Option<Array1<f64>>> {
    column.map(|c| design.select_rows(data, c)).transpose()
}

/// Number of observations with positive prior weight.
fn effective_n(weights: Option<&Array1<f64>>, n: usize) -> usize {
    weights.map_or(n, |w| w.iter().filter(|&&v| v > 0.0).count())
}

fn check_weights(weights: Option<&Array1<f64>>) -> Result<()> {
    match weights {
        Some(w) if w.iter().any(|&v| v < 0.0) => Err(RustyLmError::InvalidValue(
            "weights must be non-negative".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Positive prior weights must outnumber coefficients.
fn check_identifiable(n: usize, p: usize) -> Result<()> {
    if n <= p {
        return Err(RustyLmError::InvalidValue(format!(
            "{} observations leave no residual degrees of freedom for {} coefficients",
            n, p
        )));
    }
    Ok(())
}
