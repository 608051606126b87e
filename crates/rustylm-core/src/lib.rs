// =============================================================================
// RustyLM Core Library
// =============================================================================
//
// Linear and generalized linear models driven by R-style formulas, from data
// to fitted model to summaries, diagnostics and plots.
//
// STRUCTURE:
// ----------
//   - data:          Column-oriented data frames, CSV input/output
//   - simulate:      Deterministic and stochastic response models
//   - formula:       Parser for `y ~ x + C(g) + x:g + I(x^2) - 1`
//   - design_matrix: Formula + data -> model matrix (treatment contrasts)
//   - families:      Exponential dispersion models (Gaussian, Poisson, ...)
//   - links:         Link functions (identity, log, logit, ...)
//   - solvers:       QR least squares and IRLS
//   - models:        `lm` and `glm` fits and everything extracted from them
//   - inference:     p-values, confidence intervals, ANOVA tables
//   - diagnostics:   Residuals, influence, dispersion, information criteria
//   - tidy:          tidy/glance/augment tables and printed summaries
//   - plot:          Fit and diagnostic plots as SVG
//   - study:         Monte Carlo check of ML vs REML variance estimates
//   - error:         Error type used throughout the library
//
// FOR MAINTAINERS:
// ----------------
// New functionality goes in the module that owns the concern, with tests in
// that module. Re-export the public entry points here, and wire anything
// user-facing into the `rustylm` command line.
//
// =============================================================================

pub mod constants;
pub mod convert;
pub mod data;
pub mod design_matrix;
pub mod diagnostics;
pub mod error;
pub mod families;
pub mod formula;
pub mod inference;
pub mod links;
pub mod models;
pub mod plot;
pub mod simulate;
pub mod solvers;
pub mod study;
pub mod tidy;

pub use data::{Column, DataFrame};
pub use design_matrix::{build_design_matrix, DesignMatrix};
pub use error::{Result, RustyLmError};
pub use families::{family_from_name, Family};
pub use formula::{parse_formula, ParsedFormula};
pub use inference::{anova, compare_glm, compare_lm, AnovaTable, ModelComparison};
pub use links::{link_from_name, Link};
pub use models::{
    GeneralizedLinearModel, GlmFit, GlmOptions, Interval, LikelihoodKind, LinearModel, LmFit,
    LmOptions, Scale, VarianceMethod,
};
pub use plot::{diagnostic_plots, fit_plot, Plot};
pub use simulate::{Line, ResponseModel};
pub use solvers::{fit_glm, fit_glm_full, IRLSConfig, IRLSResult};
pub use study::{run_variance_study, StudyConfig, StudyReport};
pub use tidy::{Glance, Tidy, TidyRow};
