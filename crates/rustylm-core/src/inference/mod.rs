// =============================================================================
// Statistical Inference
// =============================================================================
//
// Reference distributions for the tests reported in model summaries:
//   - z (Normal):     GLMs whose dispersion is known (Poisson, Binomial)
//   - t (Student):    linear models and GLMs with estimated dispersion
//   - F:              overall regression test, ANOVA, nested-model tests
//   - χ²:             analysis of deviance with known dispersion
//
// plus Wald confidence intervals and the significance codes printed next to
// p-values. Table-level tests (sequential ANOVA, model comparison) live in
// the `anova` submodule.
//
// =============================================================================

mod anova;

pub use anova::{
    anova, compare_glm, compare_lm, AnovaRow, AnovaTable, ComparisonRow, ComparisonTest,
    ModelComparison,
};

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

use crate::error::{Result, RustyLmError};

fn standard_normal() -> Option<Normal> {
    Normal::new(0.0, 1.0).ok()
}

/// Reject confidence levels outside (0, 1).
pub fn check_conf_level(level: f64) -> Result<()> {
    if level > 0.0 && level < 1.0 {
        Ok(())
    } else {
        Err(RustyLmError::InvalidValue(format!(
            "confidence level must be in (0, 1), got {}",
            level
        )))
    }
}

// =============================================================================
// P-Value Calculation
// =============================================================================

/// Two-tailed p-value of a z-statistic, P(|Z| > |z|).
pub fn pvalue_z(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    match standard_normal() {
        Some(normal) => 2.0 * (1.0 - normal.cdf(z.abs())),
        None => f64::NAN,
    }
}

/// Two-tailed p-value of a t-statistic with `df` degrees of freedom.
pub fn pvalue_t(t: f64, df: f64) -> f64 {
    if !t.is_finite() || df <= 0.0 {
        return f64::NAN;
    }
    if df.is_infinite() {
        return pvalue_z(t);
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
        Err(_) => f64::NAN,
    }
}

/// Upper-tail p-value of an F statistic.
pub fn pvalue_f(f: f64, df_num: f64, df_den: f64) -> f64 {
    if f.is_nan() || df_num <= 0.0 || df_den <= 0.0 {
        return f64::NAN;
    }
    if f == f64::INFINITY {
        return 0.0;
    }
    match FisherSnedecor::new(df_num, df_den) {
        Ok(dist) => 1.0 - dist.cdf(f.max(0.0)),
        Err(_) => f64::NAN,
    }
}

/// Upper-tail p-value of a χ² statistic.
pub fn pvalue_chi2(x: f64, df: f64) -> f64 {
    if x.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if x == f64::INFINITY {
        return 0.0;
    }
    match ChiSquared::new(df) {
        Ok(dist) => 1.0 - dist.cdf(x.max(0.0)),
        Err(_) => f64::NAN,
    }
}

// =============================================================================
// Confidence Intervals
// =============================================================================

/// z_{1 - α/2} for confidence level 1 - α.
pub fn critical_value_z(confidence: f64) -> f64 {
    match standard_normal() {
        Some(normal) => normal.inverse_cdf(1.0 - (1.0 - confidence) / 2.0),
        None => f64::NAN,
    }
}

/// t_{df, 1 - α/2} for confidence level 1 - α.
pub fn critical_value_t(df: f64, confidence: f64) -> f64 {
    if df <= 0.0 {
        return f64::NAN;
    }
    if df.is_infinite() {
        return critical_value_z(confidence);
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => dist.inverse_cdf(1.0 - (1.0 - confidence) / 2.0),
        Err(_) => f64::NAN,
    }
}

/// estimate ± z · se
pub fn confidence_interval_z(estimate: f64, std_error: f64, confidence: f64) -> (f64, f64) {
    if !estimate.is_finite() || !std_error.is_finite() || std_error < 0.0 {
        return (f64::NAN, f64::NAN);
    }
    let margin = critical_value_z(confidence) * std_error;
    (estimate - margin, estimate + margin)
}

/// estimate ± t_df · se
pub fn confidence_interval_t(
    estimate: f64,
    std_error: f64,
    df: f64,
    confidence: f64,
) -> (f64, f64) {
    if !estimate.is_finite() || !std_error.is_finite() || std_error < 0.0 || df <= 0.0 {
        return (f64::NAN, f64::NAN);
    }
    let margin = critical_value_t(df, confidence) * std_error;
    (estimate - margin, estimate + margin)
}

// =============================================================================
// Significance Stars (for summary tables)
// =============================================================================

/// R's significance codes:
/// "***" p < 0.001, "**" p < 0.01, "*" p < 0.05, "." p < 0.1, "" otherwise.
pub fn significance_stars(pvalue: f64) -> &'static str {
    if pvalue < 0.001 {
        "***"
    } else if pvalue < 0.01 {
        "**"
    } else if pvalue < 0.05 {
        "*"
    } else if pvalue < 0.1 {
        "."
    } else {
        ""
    }
}

/// The legend printed under coefficient tables.
pub const SIGNIFICANCE_LEGEND: &str =
    "Signif. codes:  0 '***' 0.001 '**' 0.01 '*' 0.05 '.' 0.1 ' ' 1";

// =============================================================================
// Tests
// =============================================================================
