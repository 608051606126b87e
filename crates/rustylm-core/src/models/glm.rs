//! Generalized linear models over exponential dispersion families.

use std::fmt;

use ndarray::{Array1, Array2, Axis};
use serde::Deserialize;
use tracing::info;

use super::{
    aux_column, check_identifiable, check_weights, effective_n, Scale,
};
use crate::convert::quadratic_form;
use crate::data::DataFrame;
use crate::design_matrix::{build_design_matrix_with_aux, DesignMatrix};
use crate::diagnostics::{
    aic, bic, cooks_distance, estimate_dispersion_pearson, leave_one_out_sigma, null_deviance,
    resid_deviance, resid_pearson, resid_response, resid_working, standardized_residuals,
    studentized_residuals,
};
use crate::error::{Result, RustyLmError};
use crate::families::{family_from_name, Family};
use crate::formula::{parse_formula, ParsedFormula};
use crate::inference::{
    check_conf_level, confidence_interval_t, confidence_interval_z, pvalue_t, pvalue_z,
};
use crate::links::{link_from_name, Link};
use crate::solvers::{fit_glm_full, name_aliased_columns, IRLSConfig, IRLSResult};

/// Options for [`GeneralizedLinearModel::fit`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlmOptions {
    /// Family name, e.g. "poisson".
    pub family: String,
    /// Link name; the family's canonical link when `None`.
    pub link: Option<String>,
    /// Numeric column of prior weights (binomial: number of trials).
    pub weights: Option<String>,
    /// Numeric column added to the linear predictor as is.
    pub offset: Option<String>,
    pub irls: IRLSConfig,
    pub conf_level: f64,
}

impl Default for GlmOptions {
    fn default() -> Self {
        Self {
            family: "gaussian".to_string(),
            link: None,
            weights: None,
            offset: None,
            irls: IRLSConfig::default(),
            conf_level: 0.95,
        }
    }
}

/// Output of [`GlmFit::predict`]. `se_fit` is on the requested scale
/// (delta method for the response scale).
#[derive(Debug, Clone)]
pub struct GlmPrediction {
    pub fit: Array1<f64>,
    pub se_fit: Array1<f64>,
    pub rows: Vec<usize>,
}

pub struct GeneralizedLinearModel;

impl GeneralizedLinearModel {
    /// Fit `formula` to `data` by IRLS.
    ///
    /// # Errors
    /// Unknown family/link names, responses outside the family's support,
    /// rank-deficient designs and designs with no residual degrees of freedom.
    pub fn fit(formula: &str, data: &DataFrame, options: &GlmOptions) -> Result<GlmFit> {
        check_conf_level(options.conf_level)?;
        let parsed = parse_formula(formula)?;
        let family = family_from_name(&options.family)?;
        let link = match options.link.as_deref() {
            Some(name) => link_from_name(name)?,
            None => family.default_link(),
        };

        let aux: Vec<&str> = options
            .weights
            .iter()
            .chain(options.offset.iter())
            .map(String::as_str)
            .collect();
        let design = build_design_matrix_with_aux(&parsed, data, &aux)?;
        let y = design.response()?.clone();
        let weights = aux_column(&design, data, options.weights.as_deref())?;
        let offset = aux_column(&design, data, options.offset.as_deref())?;
        check_weights(weights.as_ref())?;

        let n_obs = effective_n(weights.as_ref(), design.n_obs());
        check_identifiable(n_obs, design.n_params())?;

        let result = fit_glm_full(
            &y,
            &design.x,
            family.as_ref(),
            link.as_ref(),
            &options.irls,
            offset.as_ref(),
            weights.as_ref(),
        )
        .map_err(|e| name_aliased_columns(e, &design.column_names))?;

        let df_residual = (n_obs - design.n_params()) as f64;
        let dispersion = if family.dispersion_is_fixed() {
            1.0
        } else {
            estimate_dispersion_pearson(
                &y,
                &result.fitted_values,
                family.as_ref(),
                &result.prior_weights,
                df_residual,
            )
        };

        let null_dev = null_model_deviance(
            &y,
            family.as_ref(),
            link.as_ref(),
            &result,
            design.has_intercept,
            offset.is_some(),
            &options.irls,
        )?;

        info!(
            formula = %parsed.text,
            family = family.name(),
            link = link.name(),
            iterations = result.iterations,
            deviance = result.deviance,
            "fitted generalized linear model"
        );

        Ok(GlmFit {
            formula: parsed,
            design,
            y,
            family,
            link,
            result,
            offset_column: options.offset.clone(),
            n_obs,
            dispersion,
            null_deviance: null_dev,
            conf_level: options.conf_level,
        })
    }
}

/// Deviance of the model with only the intercept (and offset), or of η = offset
/// when there is no intercept.
fn null_model_deviance(
    y: &Array1<f64>,
    family: &dyn Family,
    link: &dyn Link,
    fit: &IRLSResult,
    has_intercept: bool,
    has_offset: bool,
    config: &IRLSConfig,
) -> Result<f64> {
    let weights = &fit.prior_weights;
    match (has_intercept, has_offset) {
        (true, false) => Ok(null_deviance(y, family, weights)),
        (true, true) => {
            let ones = Array2::ones((y.len(), 1));
            let null_fit =
                fit_glm_full(y, &ones, family, link, config, Some(&fit.offset), Some(weights))?;
            Ok(null_fit.deviance)
        }
        (false, _) => {
            let mu = family.clamp_mu(&link.inverse(&fit.offset));
            Ok(family.deviance(y, &mu, Some(weights)))
        }
    }
}

/// A fitted generalized linear model.
pub struct GlmFit {
    formula: ParsedFormula,
    design: DesignMatrix,
    y: Array1<f64>,
    family: Box<dyn Family>,
    link: Box<dyn Link>,
    result: IRLSResult,
    offset_column: Option<String>,
    n_obs: usize,
    dispersion: f64,
    null_deviance: f64,
    conf_level: f64,
}

impl fmt::Debug for GlmFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlmFit")
            .field("formula", &self.formula.text)
            .field("family", &self.family.name())
            .field("link", &self.link.name())
            .field("coefficients", &self.result.coefficients)
            .field("deviance", &self.result.deviance)
            .finish()
    }
}

impl GlmFit {
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

    pub fn family(&self) -> &dyn Family {
        self.family.as_ref()
    }

    pub fn link(&self) -> &dyn Link {
        self.link.as_ref()
    }

    pub fn conf_level(&self) -> f64 {
        self.conf_level
    }

    pub fn prior_weights(&self) -> &Array1<f64> {
        &self.result.prior_weights
    }

    pub fn coefficient_names(&self) -> &[String] {
        &self.design.column_names
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn n_params(&self) -> usize {
        self.design.n_params()
    }

    pub fn df_residual(&self) -> f64 {
        (self.n_obs - self.n_params()) as f64
    }

    pub fn df_null(&self) -> f64 {
        (self.n_obs - usize::from(self.design.has_intercept)) as f64
    }

    pub fn iterations(&self) -> usize {
        self.result.iterations
    }

    pub fn converged(&self) -> bool {
        self.result.converged
    }

    // -------------------------------------------------------------------------
    // Estimates and inference
    // -------------------------------------------------------------------------

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.result.coefficients
    }

    /// φ: 1 for Poisson and Binomial, Pearson χ² / df otherwise.
    pub fn dispersion(&self) -> f64 {
        self.dispersion
    }

    /// Whether tests use the Normal (true) or Student t (false) reference.
    pub fn uses_z_tests(&self) -> bool {
        self.family.dispersion_is_fixed()
    }

    pub fn vcov(&self) -> Array2<f64> {
        &self.result.covariance_unscaled * self.dispersion
    }

    pub fn std_errors(&self) -> Array1<f64> {
        self.result
            .covariance_unscaled
            .diag()
            .mapv(|v| (v * self.dispersion).sqrt())
    }

    /// Wald statistics β̂ / se.
    pub fn statistics(&self) -> Array1<f64> {
        self.coefficients() / &self.std_errors()
    }

    pub fn p_values(&self) -> Array1<f64> {
        let df = self.df_residual();
        if self.uses_z_tests() {
            self.statistics().mapv(pvalue_z)
        } else {
            self.statistics().mapv(|t| pvalue_t(t, df))
        }
    }

    /// Wald intervals on the link scale.
    pub fn confint(&self, level: f64) -> Result<Vec<(f64, f64)>> {
        check_conf_level(level)?;
        let df = self.df_residual();
        let z = self.uses_z_tests();
        Ok(self
            .coefficients()
            .iter()
            .zip(self.std_errors().iter())
            .map(|(&b, &se)| {
                if z {
                    confidence_interval_z(b, se, level)
                } else {
                    confidence_interval_t(b, se, df, level)
                }
            })
            .collect())
    }

    // -------------------------------------------------------------------------
    // Goodness of fit
    // -------------------------------------------------------------------------

    pub fn deviance(&self) -> f64 {
        self.result.deviance
    }

    pub fn null_deviance(&self) -> f64 {
        self.null_deviance
    }

    pub fn pearson_chi2(&self) -> f64 {
        resid_pearson(
            &self.y,
            &self.result.fitted_values,
            self.family(),
            self.prior_weights(),
        )
        .mapv(|r| r * r)
        .sum()
    }

    /// Log-likelihood with φ at its ML value deviance / n when estimated.
    pub fn log_likelihood(&self) -> f64 {
        let phi = if self.family.dispersion_is_fixed() {
            1.0
        } else {
            self.deviance() / self.n_obs as f64
        };
        self.family.log_likelihood(
            &self.y,
            &self.result.fitted_values,
            phi,
            self.prior_weights(),
        )
    }

    fn n_estimated(&self) -> usize {
        self.n_params() + usize::from(!self.family.dispersion_is_fixed())
    }

    pub fn aic(&self) -> f64 {
        aic(self.log_likelihood(), self.n_estimated())
    }

    pub fn bic(&self) -> f64 {
        bic(self.log_likelihood(), self.n_estimated(), self.n_obs)
    }

    // -------------------------------------------------------------------------
    // Per-observation quantities
    // -------------------------------------------------------------------------

    /// μ̂
    pub fn fitted_values(&self) -> &Array1<f64> {
        &self.result.fitted_values
    }

    /// η̂ = Xβ̂ + offset
    pub fn linear_predictor(&self) -> &Array1<f64> {
        &self.result.linear_predictor
    }

    pub fn response_residuals(&self) -> Array1<f64> {
        resid_response(&self.y, self.fitted_values())
    }

    pub fn pearson_residuals(&self) -> Array1<f64> {
        resid_pearson(&self.y, self.fitted_values(), self.family(), self.prior_weights())
    }

    pub fn deviance_residuals(&self) -> Array1<f64> {
        resid_deviance(&self.y, self.fitted_values(), self.family(), self.prior_weights())
    }

    pub fn working_residuals(&self) -> Array1<f64> {
        resid_working(&self.y, self.fitted_values(), self.link())
    }

    pub fn hat_values(&self) -> &Array1<f64> {
        &self.result.leverage
    }

    /// Standardized deviance residuals r_D / √(φ(1 - h)).
    pub fn standardized_residuals(&self) -> Array1<f64> {
        standardized_residuals(&self.deviance_residuals(), self.hat_values(), self.dispersion)
    }

    pub fn studentized_residuals(&self) -> Array1<f64> {
        studentized_residuals(&self.standardized_residuals(), self.df_residual())
    }

    /// Cook's distance from Pearson residuals.
    pub fn cooks_distance(&self) -> Array1<f64> {
        cooks_distance(
            &self.pearson_residuals(),
            self.hat_values(),
            self.dispersion,
            self.n_params(),
        )
    }

    pub fn leave_one_out_sigma(&self) -> Array1<f64> {
        leave_one_out_sigma(&self.deviance_residuals(), self.hat_values(), self.df_residual())
    }

    // -------------------------------------------------------------------------
    // Prediction
    // -------------------------------------------------------------------------

    /// Predict on the link or response scale. An offset column used in
    /// fitting must be present in `new_data`.
    pub fn predict(&self, new_data: &DataFrame, scale: Scale) -> Result<GlmPrediction> {
        let new_design = self.design.for_new_data(&self.formula, new_data)?;
        if new_design.n_params() != self.n_params() {
            return Err(RustyLmError::DimensionMismatch(format!(
                "new data produced {} columns but the model has {}",
                new_design.n_params(),
                self.n_params()
            )));
        }

        let mut eta = new_design.x.dot(self.coefficients());
        if let Some(column) = &self.offset_column {
            eta = eta + new_design.select_rows(new_data, column)?;
        }

        let vcov = self.vcov();
        let se_eta: Array1<f64> = new_design
            .x
            .axis_iter(Axis(0))
            .map(|row| quadratic_form(&row.to_owned(), &vcov).max(0.0).sqrt())
            .collect();

        let (fit, se_fit) = match scale {
            Scale::Link => (eta, se_eta),
            Scale::Response => {
                let mu = self.link.inverse(&eta);
                let deriv = self.link.derivative(&mu);
                let se_mu = &se_eta / &deriv.mapv(f64::abs);
                (mu, se_mu)
            }
        };

        Ok(GlmPrediction {
            fit,
            se_fit,
            rows: new_design.rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinearModel, LmOptions};
    use approx::assert_abs_diff_eq;

    fn count_data() -> DataFrame {
        DataFrame::new()
            .with_numeric("x", vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0])
            .unwrap()
            .with_numeric("y", vec![1.0, 2.0, 2.0, 4.0, 5.0, 8.0, 11.0, 16.0])
            .unwrap()
    }

    fn poisson() -> GlmOptions {
        GlmOptions {
            family: "poisson".to_string(),
            ..GlmOptions::default()
        }
    }

    #[test]
    fn test_gaussian_glm_matches_lm() {
        let data = count_data();
        let glm = GeneralizedLinearModel::fit("y ~ x", &data, &GlmOptions::default()).unwrap();
        let lm = LinearModel::fit("y ~ x", &data, &LmOptions::default()).unwrap();

        for j in 0..2 {
            assert_abs_diff_eq!(glm.coefficients()[j], lm.coefficients()[j], epsilon = 1e-8);
            assert_abs_diff_eq!(glm.std_errors()[j], lm.std_errors()[j], epsilon = 1e-8);
        }
        assert_abs_diff_eq!(glm.dispersion(), lm.sigma2_reml(), epsilon = 1e-8);
        assert_abs_diff_eq!(glm.deviance(), lm.rss(), epsilon = 1e-8);
        assert_abs_diff_eq!(glm.aic(), lm.aic(), epsilon = 1e-6);
        assert!(!glm.uses_z_tests());
    }

    #[test]
    fn test_poisson_dispersion_fixed() {
        let fit = GeneralizedLinearModel::fit("y ~ x", &count_data(), &poisson()).unwrap();
        assert!(fit.converged());
        assert_eq!(fit.dispersion(), 1.0);
        assert!(fit.uses_z_tests());
        assert!(fit.deviance() < fit.null_deviance());
        assert_eq!(fit.df_null(), 7.0);
        assert_eq!(fit.df_residual(), 6.0);
    }

    #[test]
    fn test_poisson_null_deviance_is_intercept_only_fit() {
        let data = count_data();
        let full = GeneralizedLinearModel::fit("y ~ x", &data, &poisson()).unwrap();
        let null = GeneralizedLinearModel::fit("y ~ 1", &data, &poisson()).unwrap();
        assert_abs_diff_eq!(full.null_deviance(), null.deviance(), epsilon = 1e-8);
    }

    #[test]
    fn test_offset_null_deviance() {
        let data = count_data()
            .with_numeric("lexp", vec![0.0, 0.1, 0.0, 0.2, 0.1, 0.0, 0.3, 0.2])
            .unwrap();
        let options = GlmOptions {
            offset: Some("lexp".to_string()),
            ..poisson()
        };
        let full = GeneralizedLinearModel::fit("y ~ x", &data, &options).unwrap();
        let null = GeneralizedLinearModel::fit("y ~ 1", &data, &options).unwrap();
        assert_abs_diff_eq!(full.null_deviance(), null.deviance(), epsilon = 1e-6);
    }

    #[test]
    fn test_predict_response_is_inverse_link_of_link_scale() {
        let fit = GeneralizedLinearModel::fit("y ~ x", &count_data(), &poisson()).unwrap();
        let new = DataFrame::new().with_numeric("x", vec![2.5, 8.0]).unwrap();
        let link = fit.predict(&new, Scale::Link).unwrap();
        let resp = fit.predict(&new, Scale::Response).unwrap();
        for i in 0..2 {
            assert_abs_diff_eq!(resp.fit[i], link.fit[i].exp(), epsilon = 1e-10);
            // Delta method for the log link: se(μ) = μ · se(η)
            assert_abs_diff_eq!(resp.se_fit[i], resp.fit[i] * link.se_fit[i], epsilon = 1e-8);
        }
    }

    #[test]
    fn test_residual_relationships() {
        let fit = GeneralizedLinearModel::fit("y ~ x", &count_data(), &poisson()).unwrap();
        let dev_sq: f64 = fit.deviance_residuals().mapv(|r| r * r).sum();
        assert_abs_diff_eq!(dev_sq, fit.deviance(), epsilon = 1e-8);
        assert_abs_diff_eq!(fit.hat_values().sum(), 2.0, epsilon = 1e-6);
        assert!(fit.pearson_chi2() > 0.0);
    }

    #[test]
    fn test_binomial_with_trials() {
        let data = DataFrame::new()
            .with_numeric("dose", vec![1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap()
            .with_numeric("prop", vec![0.1, 0.25, 0.5, 0.7, 0.9])
            .unwrap()
            .with_numeric("n", vec![20.0, 20.0, 20.0, 20.0, 20.0])
            .unwrap();
        let fit = GeneralizedLinearModel::fit(
            "prop ~ dose",
            &data,
            &GlmOptions {
                family: "binomial".to_string(),
                weights: Some("n".to_string()),
                ..GlmOptions::default()
            },
        )
        .unwrap();
        assert!(fit.converged());
        assert!(fit.coefficients()[1] > 0.0);
        assert!(fit.fitted_values().iter().all(|&m| m > 0.0 && m < 1.0));
    }

    #[test]
    fn test_gamma_has_t_tests() {
        let data = DataFrame::new()
            .with_numeric("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .with_numeric("y", vec![1.2, 2.3, 2.9, 4.8, 4.1, 7.0])
            .unwrap();
        let fit = GeneralizedLinearModel::fit(
            "y ~ x",
            &data,
            &GlmOptions {
                family: "gamma".to_string(),
                link: Some("log".to_string()),
                ..GlmOptions::default()
            },
        )
        .unwrap();
        assert!(!fit.uses_z_tests());
        assert!(fit.dispersion() > 0.0 && fit.dispersion() != 1.0);
    }

    #[test]
    fn test_unknown_family() {
        let err = GeneralizedLinearModel::fit(
            "y ~ x",
            &count_data(),
            &GlmOptions {
                family: "weibull".to_string(),
                ..GlmOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, RustyLmError::InvalidValue(_)));
    }

    #[test]
    fn test_options_from_json() {
        let options: GlmOptions =
            serde_json::from_str(r#"{"family": "poisson", "irls": {"max_iterations": 40}}"#)
                .unwrap();
        assert_eq!(options.family, "poisson");
        assert_eq!(options.irls.max_iterations, 40);
        assert_eq!(options.conf_level, 0.95);
    }
}
