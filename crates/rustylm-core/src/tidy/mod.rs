// =============================================================================
// Tidy Model Summaries
// =============================================================================
//
// Fitted models are turned into three flat tables:
//
//   tidy     one row per coefficient (estimate, SE, statistic, p, CI)
//   glance   one row per model (fit statistics)
//   augment  one row per observation (fitted, residual, influence)
//
// Rows are plain serde structs, so they go to CSV or JSON unchanged. The
// printed R-style summaries live in `summary`.
//
// =============================================================================

pub mod format;
mod summary;

pub use summary::{GlmSummary, LmSummary};

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::models::{GlmFit, LikelihoodKind, LmFit};

/// One coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TidyRow {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub conf_low: f64,
    pub conf_high: f64,
}

/// One-row model summary. Fields that do not apply to a model type are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Glance {
    pub nobs: usize,
    pub df: usize,
    pub df_residual: f64,
    pub r_squared: Option<f64>,
    pub adj_r_squared: Option<f64>,
    pub sigma: Option<f64>,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub log_lik: f64,
    pub aic: f64,
    pub bic: f64,
    /// RSS for linear models
    pub deviance: f64,
    pub null_deviance: Option<f64>,
    pub df_null: Option<f64>,
    pub dispersion: Option<f64>,
}

/// One observation used in the fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AugmentRow {
    /// 1-based row of the original data
    pub row: usize,
    pub y: f64,
    pub fitted: f64,
    /// Raw residual for linear models, deviance residual for GLMs
    pub resid: f64,
    pub hat: f64,
    /// Leave-one-out σ̂
    pub sigma: f64,
    pub cooks_d: f64,
    pub std_resid: f64,
}

/// Tabular views of a fitted model.
pub trait Tidy {
    fn tidy(&self, conf_level: f64) -> Result<Vec<TidyRow>>;
    fn glance(&self) -> Glance;
    fn augment(&self) -> Vec<AugmentRow>;
}

fn tidy_rows(
    names: &[String],
    estimates: &[f64],
    std_errors: &[f64],
    statistics: &[f64],
    p_values: &[f64],
    intervals: &[(f64, f64)],
) -> Vec<TidyRow> {
    (0..names.len())
        .map(|j| TidyRow {
            term: names[j].clone(),
            estimate: estimates[j],
            std_error: std_errors[j],
            statistic: statistics[j],
            p_value: p_values[j],
            conf_low: intervals[j].0,
            conf_high: intervals[j].1,
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn augment_rows(
    rows: &[usize],
    y: &[f64],
    fitted: &[f64],
    resid: &[f64],
    hat: &[f64],
    sigma: &[f64],
    cooks_d: &[f64],
    std_resid: &[f64],
) -> Vec<AugmentRow> {
    (0..rows.len())
        .map(|i| AugmentRow {
            row: rows[i] + 1,
            y: y[i],
            fitted: fitted[i],
            resid: resid[i],
            hat: hat[i],
            sigma: sigma[i],
            cooks_d: cooks_d[i],
            std_resid: std_resid[i],
        })
        .collect()
}

impl Tidy for LmFit {
    fn tidy(&self, conf_level: f64) -> Result<Vec<TidyRow>> {
        let intervals = self.confint(conf_level)?;
        Ok(tidy_rows(
            self.coefficient_names(),
            &self.coefficients().to_vec(),
            &self.std_errors().to_vec(),
            &self.t_values().to_vec(),
            &self.p_values().to_vec(),
            &intervals,
        ))
    }

    fn glance(&self) -> Glance {
        let f = self.f_statistic();
        Glance {
            nobs: self.n_obs(),
            df: self.n_params(),
            df_residual: self.df_residual(),
            r_squared: Some(self.r_squared()),
            adj_r_squared: Some(self.adj_r_squared()),
            sigma: Some(self.sigma()),
            statistic: f.map(|f| f.value),
            p_value: f.map(|f| f.p_value),
            log_lik: self.log_likelihood(LikelihoodKind::Ml),
            aic: self.aic(),
            bic: self.bic(),
            deviance: self.rss(),
            null_deviance: None,
            df_null: None,
            dispersion: None,
        }
    }

    fn augment(&self) -> Vec<AugmentRow> {
        augment_rows(
            &self.design().rows,
            &self.response().to_vec(),
            &self.fitted_values().to_vec(),
            &self.residuals().to_vec(),
            &self.hat_values().to_vec(),
            &self.leave_one_out_sigma().to_vec(),
            &self.cooks_distance().to_vec(),
            &self.standardized_residuals().to_vec(),
        )
    }
}

impl Tidy for GlmFit {
    fn tidy(&self, conf_level: f64) -> Result<Vec<TidyRow>> {
        let intervals = self.confint(conf_level)?;
        Ok(tidy_rows(
            self.coefficient_names(),
            &self.coefficients().to_vec(),
            &self.std_errors().to_vec(),
            &self.statistics().to_vec(),
            &self.p_values().to_vec(),
            &intervals,
        ))
    }

    fn glance(&self) -> Glance {
        Glance {
            nobs: self.n_obs(),
            df: self.n_params(),
            df_residual: self.df_residual(),
            r_squared: None,
            adj_r_squared: None,
            sigma: Some(self.dispersion().sqrt()),
            statistic: None,
            p_value: None,
            log_lik: self.log_likelihood(),
            aic: self.aic(),
            bic: self.bic(),
            deviance: self.deviance(),
            null_deviance: Some(self.null_deviance()),
            df_null: Some(self.df_null()),
            dispersion: Some(self.dispersion()),
        }
    }

    fn augment(&self) -> Vec<AugmentRow> {
        augment_rows(
            &self.design().rows,
            &self.response().to_vec(),
            &self.fitted_values().to_vec(),
            &self.deviance_residuals().to_vec(),
            &self.hat_values().to_vec(),
            &self.leave_one_out_sigma().to_vec(),
            &self.cooks_distance().to_vec(),
            &self.standardized_residuals().to_vec(),
        )
    }
}

/// Write serializable rows as CSV with a header line.
pub fn write_csv<T: Serialize, W: Write>(rows: &[T], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Pretty-printed JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
