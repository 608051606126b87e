// =============================================================================
// Model Diagnostics
// =============================================================================
//
// Tools for asking whether a fitted model is any good:
//
// - RESIDUALS: response, Pearson, deviance and working residuals, plus the
//   leverage-adjusted standardized and studentized versions
// - INFLUENCE: hat values, Cook's distance, leave-one-out σ
// - DISPERSION: estimating the scale parameter φ
// - MODEL FIT: log-likelihoods, AIC, BIC, null deviance
// - COLLINEARITY: variance inflation factors
// - NORMALITY: Jarque-Bera test on residuals
// - QUANTILES: the five-number residual summary printed by `summary`
//
// Everything here is a plain function of vectors; the fit objects wire
// them up.
//
// =============================================================================

mod dispersion;
mod influence;
mod jarque_bera;
mod model_fit;
mod quantile;
mod residuals;
mod vif;

pub use residuals::{
    resid_deviance, resid_pearson, resid_response, resid_working, standardized_residuals,
    studentized_residuals,
};

pub use influence::{cooks_distance, leave_one_out_sigma};

pub use dispersion::{estimate_dispersion_deviance, estimate_dispersion_pearson, pearson_chi2};

pub use model_fit::{
    aic, bic, log_likelihood_normal_ml, log_likelihood_normal_reml, null_deviance,
};

pub use jarque_bera::{jarque_bera, JarqueBeraResult};
pub use quantile::{five_number_summary, quantile};
pub use vif::compute_vif;
