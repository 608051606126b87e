// =============================================================================
// Solvers
// =============================================================================
//
// Two fitting engines:
//
//   ols   - direct (weighted) least squares through a QR factorisation.
//           Linear models are fitted in one shot.
//
//   irls  - Iteratively Reweighted Least Squares for GLMs,
//
//               g(E[Y]) = Xβ + offset
//
//           Each iteration linearises the link around the current mean and
//           calls the least-squares solver with updated weights.
//
// =============================================================================

mod irls;
pub mod ols;

pub use irls::{fit_glm, fit_glm_full, IRLSConfig, IRLSResult};
pub use ols::{name_aliased_columns, solve_least_squares, LeastSquaresSolution};

use ndarray::Array1;

use crate::families::Family;

/// Fallback starting means for when `family.initialize_mu` lands outside
/// the valid range: each yᵢ is pulled halfway to the overall mean, then
/// clamped by the family.
pub(crate) fn initialize_mu_safe(y: &Array1<f64>, family: &dyn Family) -> Array1<f64> {
    let y_mean = y.mean().unwrap_or(1.0).max(0.01);
    let raw: Array1<f64> = y.mapv(|yi| (yi + y_mean) / 2.0);
    family.clamp_mu(&raw)
}
