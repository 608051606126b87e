//! Linear models fitted by (weighted) least squares.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    aux_column, check_identifiable, check_weights, effective_n, Interval, LikelihoodKind,
    VarianceMethod,
};
use crate::convert::quadratic_form;
use crate::data::DataFrame;
use crate::design_matrix::{build_design_matrix_with_aux, DesignMatrix};
use crate::diagnostics::{
    aic, bic, cooks_distance, leave_one_out_sigma, log_likelihood_normal_ml,
    log_likelihood_normal_reml, standardized_residuals, studentized_residuals,
};
use crate::error::{Result, RustyLmError};
use crate::formula::{parse_formula, ParsedFormula};
use crate::inference::{
    check_conf_level, confidence_interval_t, critical_value_t, pvalue_f, pvalue_t,
};
use crate::solvers::{name_aliased_columns, solve_least_squares, LeastSquaresSolution};

/// Options for [`LinearModel::fit`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LmOptions {
    /// Name of a numeric column of prior weights.
    pub weights: Option<String>,
    pub variance_method: VarianceMethod,
    pub conf_level: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            weights: None,
            variance_method: VarianceMethod::Reml,
            conf_level: 0.95,
        }
    }
}

/// Overall F test of the model against the intercept-only (or empty) model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FStatistic {
    pub value: f64,
    pub df_num: f64,
    pub df_den: f64,
    pub p_value: f64,
}

/// Output of [`LmFit::predict`]. Rows with missing predictors are dropped;
/// `rows` maps each prediction back to the new data.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub fit: Array1<f64>,
    pub se_fit: Array1<f64>,
    pub lower: Option<Array1<f64>>,
    pub upper: Option<Array1<f64>>,
    pub rows: Vec<usize>,
}

pub struct LinearModel;

impl LinearModel {
    /// Fit `formula` to `data` by least squares.
    ///
    /// # Errors
    /// Formula and column errors, rank-deficient designs (named columns) and
    /// designs with no residual degrees of freedom.
    pub fn fit(formula: &str, data: &DataFrame, options: &LmOptions) -> Result<LmFit> {
        check_conf_level(options.conf_level)?;
        let parsed = parse_formula(formula)?;

        let aux: Vec<&str> = options.weights.as_deref().into_iter().collect();
        let design = build_design_matrix_with_aux(&parsed, data, &aux)?;
        let y = design.response()?.clone();
        let weights = aux_column(&design, data, options.weights.as_deref())?;
        check_weights(weights.as_ref())?;

        let n_obs = effective_n(weights.as_ref(), design.n_obs());
        check_identifiable(n_obs, design.n_params())?;

        let solution = solve_least_squares(&design.x, &y, weights.as_ref())
            .map_err(|e| name_aliased_columns(e, &design.column_names))?;

        info!(
            formula = %parsed.text,
            n = n_obs,
            p = design.n_params(),
            rss = solution.rss,
            "fitted linear model"
        );

        Ok(LmFit {
            formula: parsed,
            design,
            y,
            weights,
            solution,
            n_obs,
            variance_method: options.variance_method,
            conf_level: options.conf_level,
        })
    }
}

/// A fitted linear model.
#[derive(Debug, Clone)]
pub struct LmFit {
    formula: ParsedFormula,
    design: DesignMatrix,
    y: Array1<f64>,
    weights: Option<Array1<f64>>,
    solution: LeastSquaresSolution,
    n_obs: usize,
    variance_method: VarianceMethod,
    conf_level: f64,
}

impl LmFit {
    // -------------------------------------------------------------------------
    // Model description
    // -------------------------------------------------------------------------

    pub fn formula(&self) -> &ParsedFormula {
        &self.formula
    }

    pub fn design(&self) -> &DesignMatrix {
        &self.design
    }

    pub fn response(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn weights(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    pub fn variance_method(&self) -> VarianceMethod {
        self.variance_method
    }

    pub fn conf_level(&self) -> f64 {
        self.conf_level
    }

    pub fn coefficient_names(&self) -> &[String] {
        &self.design.column_names
    }

    /// Observations with positive weight.
    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn n_params(&self) -> usize {
        self.design.n_params()
    }

    pub fn df_residual(&self) -> f64 {
        (self.n_obs - self.n_params()) as f64
    }

    // -------------------------------------------------------------------------
    // Estimates and inference
    // -------------------------------------------------------------------------

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.solution.coefficients
    }

    /// Q'√W·y from the QR factorisation, one per coefficient.
    pub fn effects(&self) -> &Array1<f64> {
        &self.solution.effects
    }

    pub fn rss(&self) -> f64 {
        self.solution.rss
    }

    /// Maximum likelihood estimate RSS / n (biased low).
    pub fn sigma2_ml(&self) -> f64 {
        self.rss() / self.n_obs as f64
    }

    /// Restricted maximum likelihood estimate RSS / (n - p) (unbiased).
    pub fn sigma2_reml(&self) -> f64 {
        self.rss() / self.df_residual()
    }

    /// σ̂² under the configured variance method.
    pub fn sigma2(&self) -> f64 {
        match self.variance_method {
            VarianceMethod::Reml => self.sigma2_reml(),
            VarianceMethod::Ml => self.sigma2_ml(),
        }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma2().sqrt()
    }

    /// σ̂² (X'WX)⁻¹
    pub fn vcov(&self) -> Array2<f64> {
        &self.solution.covariance_unscaled * self.sigma2()
    }

    pub fn std_errors(&self) -> Array1<f64> {
        self.solution
            .covariance_unscaled
            .diag()
            .mapv(|v| (v * self.sigma2()).sqrt())
    }

    pub fn t_values(&self) -> Array1<f64> {
        self.coefficients() / &self.std_errors()
    }

    pub fn p_values(&self) -> Array1<f64> {
        let df = self.df_residual();
        self.t_values().mapv(|t| pvalue_t(t, df))
    }

    /// Per-coefficient t intervals at `level`.
    pub fn confint(&self, level: f64) -> Result<Vec<(f64, f64)>> {
        check_conf_level(level)?;
        let df = self.df_residual();
        Ok(self
            .coefficients()
            .iter()
            .zip(self.std_errors().iter())
            .map(|(&b, &se)| confidence_interval_t(b, se, df, level))
            .collect())
    }

    // -------------------------------------------------------------------------
    // Goodness of fit
    // -------------------------------------------------------------------------

    fn prior_weight(&self, i: usize) -> f64 {
        self.weights.as_ref().map_or(1.0, |w| w[i])
    }

    /// Total sum of squares, about the weighted mean when there is an intercept.
    fn tss(&self) -> f64 {
        let centre = if self.design.has_intercept {
            let (sw, swy) = (0..self.y.len()).fold((0.0, 0.0), |(sw, swy), i| {
                let w = self.prior_weight(i);
                (sw + w, swy + w * self.y[i])
            });
            swy / sw
        } else {
            0.0
        };
        (0..self.y.len())
            .map(|i| self.prior_weight(i) * (self.y[i] - centre).powi(2))
            .sum()
    }

    pub fn r_squared(&self) -> f64 {
        1.0 - self.rss() / self.tss()
    }

    pub fn adj_r_squared(&self) -> f64 {
        let n_minus_int = (self.n_obs - usize::from(self.design.has_intercept)) as f64;
        1.0 - (1.0 - self.r_squared()) * n_minus_int / self.df_residual()
    }

    /// `None` for models with nothing beyond the intercept.
    pub fn f_statistic(&self) -> Option<FStatistic> {
        let df_num = self.n_params() - usize::from(self.design.has_intercept);
        if df_num == 0 {
            return None;
        }
        let df_num = df_num as f64;
        let df_den = self.df_residual();
        let value = ((self.tss() - self.rss()) / df_num) / self.sigma2_reml();
        Some(FStatistic {
            value,
            df_num,
            df_den,
            p_value: pvalue_f(value, df_num, df_den),
        })
    }

    fn sum_log_weights(&self) -> f64 {
        self.weights
            .as_ref()
            .map_or(0.0, |w| w.iter().filter(|&&v| v > 0.0).map(|v| v.ln()).sum())
    }

    pub fn log_likelihood(&self, kind: LikelihoodKind) -> f64 {
        match kind {
            LikelihoodKind::Ml => {
                log_likelihood_normal_ml(self.rss(), self.n_obs, self.sum_log_weights())
            }
            LikelihoodKind::Reml => log_likelihood_normal_reml(
                self.rss(),
                self.n_obs,
                self.n_params(),
                self.sum_log_weights(),
                self.solution.log_abs_det_r,
            ),
        }
    }

    /// AIC from the ML log-likelihood; σ² counts as a parameter.
    pub fn aic(&self) -> f64 {
        aic(self.log_likelihood(LikelihoodKind::Ml), self.n_params() + 1)
    }

    pub fn bic(&self) -> f64 {
        bic(
            self.log_likelihood(LikelihoodKind::Ml),
            self.n_params() + 1,
            self.n_obs,
        )
    }

    // -------------------------------------------------------------------------
    // Per-observation quantities
    // -------------------------------------------------------------------------

    pub fn fitted_values(&self) -> &Array1<f64> {
        &self.solution.fitted_values
    }

    /// y - ŷ
    pub fn residuals(&self) -> &Array1<f64> {
        &self.solution.residuals
    }

    /// √w (y - ŷ)
    pub fn weighted_residuals(&self) -> Array1<f64> {
        match &self.weights {
            Some(w) => &self.solution.residuals * &w.mapv(f64::sqrt),
            None => self.solution.residuals.clone(),
        }
    }

    pub fn hat_values(&self) -> &Array1<f64> {
        &self.solution.leverage
    }

    /// Internally studentized residuals, always on the unbiased σ̂.
    pub fn standardized_residuals(&self) -> Array1<f64> {
        standardized_residuals(&self.weighted_residuals(), self.hat_values(), self.sigma2_reml())
    }

    /// Externally studentized residuals (leave-one-out σ̂).
    pub fn studentized_residuals(&self) -> Array1<f64> {
        studentized_residuals(&self.standardized_residuals(), self.df_residual())
    }

    pub fn cooks_distance(&self) -> Array1<f64> {
        cooks_distance(
            &self.weighted_residuals(),
            self.hat_values(),
            self.sigma2_reml(),
            self.n_params(),
        )
    }

    /// σ̂ with each observation left out in turn.
    pub fn leave_one_out_sigma(&self) -> Array1<f64> {
        leave_one_out_sigma(&self.weighted_residuals(), self.hat_values(), self.df_residual())
    }

    // -------------------------------------------------------------------------
    // Prediction
    // -------------------------------------------------------------------------

    /// Predict the mean response for `new_data`, optionally with intervals.
    ///
    /// Prediction intervals add σ̂² (configured variance method) to the
    /// variance of the fitted mean.
    pub fn predict(&self, new_data: &DataFrame, interval: Interval, level: f64) -> Result<Prediction> {
        check_conf_level(level)?;
        let new_design = self.design.for_new_data(&self.formula, new_data)?;
        if new_design.n_params() != self.n_params() {
            return Err(RustyLmError::DimensionMismatch(format!(
                "new data produced {} columns but the model has {}",
                new_design.n_params(),
                self.n_params()
            )));
        }

        let fit = new_design.x.dot(self.coefficients());
        let vcov = self.vcov();
        let se_fit: Array1<f64> = new_design
            .x
            .axis_iter(Axis(0))
            .map(|row| quadratic_form(&row.to_owned(), &vcov).max(0.0).sqrt())
            .collect();

        let extra_variance = match interval {
            Interval::None => None,
            Interval::Confidence => Some(0.0),
            Interval::Prediction => Some(self.sigma2()),
        };

        let (lower, upper) = match extra_variance {
            Some(extra) => {
                let t = critical_value_t(self.df_residual(), level);
                let half: Array1<f64> = se_fit.mapv(|se| t * (se * se + extra).sqrt());
                (Some(&fit - &half), Some(&fit + &half))
            }
            None => (None, None),
        };

        Ok(Prediction {
            fit,
            se_fit,
            lower,
            upper,
            rows: new_design.rows,
        })
    }
}
