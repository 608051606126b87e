// =============================================================================
// Least Squares via QR
// =============================================================================
//
// Ordinary (and weighted) least squares minimises
//
//     Σ wᵢ (yᵢ - xᵢ'β)²
//
// Rather than forming X'WX and inverting it (which squares the condition
// number), we factor the row-scaled matrix √W·X = QR and solve the triangular
// system Rβ = Q'√W·y. The factorisation also gives, for free:
//
//   - (X'WX)⁻¹ = R⁻¹R⁻ᵀ            → coefficient covariance
//   - effects  = Q'√W·y             → sequential sums of squares (ANOVA)
//   - hᵢ       = ‖row i of Q‖²      → leverages (hat values)
//   - log|det R|                    → REML log-likelihood
//
// RANK: if a column is (numerically) a linear combination of the columns
// before it, its diagonal entry in R collapses to ~0. Those columns are
// reported as aliased instead of producing meaningless estimates.
//
// =============================================================================

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

use crate::constants::RANK_TOL;
use crate::convert::{to_array1, to_array2};
use crate::error::{Result, RustyLmError};

/// Everything the models need from one least-squares solve.
#[derive(Debug, Clone)]
pub struct LeastSquaresSolution {
    /// β̂
    pub coefficients: Array1<f64>,
    /// (X'WX)⁻¹
    pub covariance_unscaled: Array2<f64>,
    /// Xβ̂
    pub fitted_values: Array1<f64>,
    /// y - Xβ̂
    pub residuals: Array1<f64>,
    /// Q'√W·y, one entry per column of X
    pub effects: Array1<f64>,
    /// Diagonal of the (weighted) hat matrix
    pub leverage: Array1<f64>,
    /// Σ wᵢ rᵢ²
    pub rss: f64,
    /// Σ log|R_jj|
    pub log_abs_det_r: f64,
}

/// Solve (weighted) least squares for y ≈ Xβ.
///
/// # Arguments
/// * `x` - Design matrix (n × p)
/// * `y` - Response (n)
/// * `weights` - Optional non-negative prior weights (n)
///
/// # Errors
/// * `DimensionMismatch` if the shapes disagree
/// * `InvalidValue` if n < p or a weight is negative
/// * `RankDeficient` listing aliased columns as "column j" (1-based)
pub fn solve_least_squares(
    x: &Array2<f64>,
    y: &Array1<f64>,
    weights: Option<&Array1<f64>>,
) -> Result<LeastSquaresSolution> {
    let n = x.nrows();
    let p = x.ncols();

    if y.len() != n {
        return Err(RustyLmError::DimensionMismatch(format!(
            "X has {} rows but y has {} elements",
            n,
            y.len()
        )));
    }
    if p == 0 {
        return Err(RustyLmError::EmptyInput("X has no columns".to_string()));
    }
    if n < p {
        return Err(RustyLmError::InvalidValue(format!(
            "{} observations cannot identify {} coefficients",
            n, p
        )));
    }

    let sqrt_w: Vec<f64> = match weights {
        Some(w) => {
            if w.len() != n {
                return Err(RustyLmError::DimensionMismatch(format!(
                    "weights has {} elements but y has {}",
                    w.len(),
                    n
                )));
            }
            if w.iter().any(|&wi| !(wi >= 0.0) || !wi.is_finite()) {
                return Err(RustyLmError::InvalidValue(
                    "weights must be finite and non-negative".to_string(),
                ));
            }
            w.iter().map(|wi| wi.sqrt()).collect()
        }
        None => vec![1.0; n],
    };

    // Row-scale: X_w = √W X, y_w = √W y
    let x_weighted = DMatrix::from_fn(n, p, |i, j| x[[i, j]] * sqrt_w[i]);
    let y_weighted = DVector::from_fn(n, |i, _| y[i] * sqrt_w[i]);

    let qr = x_weighted.qr();
    let q = qr.q();
    let r = qr.r();

    // Rank check on the diagonal of R
    let max_diag = (0..p).map(|j| r[(j, j)].abs()).fold(0.0, f64::max);
    let aliased: Vec<String> = (0..p)
        .filter(|&j| r[(j, j)].abs() <= RANK_TOL * max_diag || max_diag == 0.0)
        .map(|j| format!("column {}", j + 1))
        .collect();
    if !aliased.is_empty() {
        return Err(RustyLmError::RankDeficient(aliased));
    }

    let effects = q.transpose() * &y_weighted;

    let beta = r.solve_upper_triangular(&effects).ok_or_else(|| {
        RustyLmError::LinearAlgebraError("triangular solve failed".to_string())
    })?;

    let r_inv = r
        .solve_upper_triangular(&DMatrix::identity(p, p))
        .ok_or_else(|| RustyLmError::LinearAlgebraError("cannot invert R".to_string()))?;
    let cov = &r_inv * r_inv.transpose();

    let leverage: Array1<f64> = (0..n)
        .map(|i| (0..p).map(|j| q[(i, j)].powi(2)).sum())
        .collect();

    let coefficients = to_array1(&beta);
    let fitted_values = x.dot(&coefficients);
    let residuals = y - &fitted_values;
    let rss = residuals
        .iter()
        .zip(sqrt_w.iter())
        .map(|(r, sw)| (r * sw).powi(2))
        .sum();
    let log_abs_det_r = (0..p).map(|j| r[(j, j)].abs().ln()).sum();

    Ok(LeastSquaresSolution {
        coefficients,
        covariance_unscaled: to_array2(&cov),
        fitted_values,
        residuals,
        effects: to_array1(&effects),
        leverage,
        rss,
        log_abs_det_r,
    })
}

/// Replace the solver's positional column labels with real column names.
pub fn name_aliased_columns(err: RustyLmError, column_names: &[String]) -> RustyLmError {
    match err {
        RustyLmError::RankDeficient(cols) => RustyLmError::RankDeficient(
            cols.iter()
                .map(|c| {
                    c.strip_prefix("column ")
                        .and_then(|j| j.parse::<usize>().ok())
                        .and_then(|j| column_names.get(j - 1))
                        .cloned()
                        .unwrap_or_else(|| c.clone())
                })
                .collect(),
        ),
        other => other,
    }
}
