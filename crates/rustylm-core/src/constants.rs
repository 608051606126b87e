//! Numerical constants shared by the families, solvers and diagnostics.

/// Smallest fitted mean allowed for families with positive support.
pub const MU_MIN_POSITIVE: f64 = 1e-10;

/// Fitted probabilities are kept inside [MU_MIN_PROBABILITY, MU_MAX_PROBABILITY].
pub const MU_MIN_PROBABILITY: f64 = 1e-10;
pub const MU_MAX_PROBABILITY: f64 = 1.0 - 1e-10;

/// Tolerance for "is this exactly zero/one" comparisons on weights.
pub const ZERO_TOL: f64 = 1e-12;

/// Relative size of |R_jj| below which a QR pivot is treated as aliased.
pub const RANK_TOL: f64 = 1e-7;

/// Upper clip for IRLS working weights.
pub const MAX_IRLS_WEIGHT: f64 = 1e10;
