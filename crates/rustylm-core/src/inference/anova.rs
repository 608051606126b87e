//! Sequential ANOVA and nested-model comparison.
//!
//! Type I sums of squares come straight from the QR effects: the effect of a
//! column is the reduction in RSS from adding it after every column to its
//! left, so a term's sum of squares is the sum of its columns' squared effects.

use std::fmt;

use serde::Serialize;

use super::{pvalue_chi2, pvalue_f, significance_stars, SIGNIFICANCE_LEGEND};
use crate::error::{Result, RustyLmError};
use crate::models::{GlmFit, LmFit};
use crate::tidy::format::{fmt_pvalue, fmt_sig, render_table};

/// One line of a sequential ANOVA table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaRow {
    pub term: String,
    pub df: f64,
    pub sum_sq: f64,
    pub mean_sq: f64,
    pub f_value: Option<f64>,
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnovaTable {
    pub response: String,
    pub rows: Vec<AnovaRow>,
}

/// Sequential (type I) analysis of variance for a linear model.
///
/// Terms enter in formula order; the final row holds the residuals.
pub fn anova(fit: &LmFit) -> AnovaTable {
    let design = fit.design();
    let effects = fit.effects();
    let df_res = fit.df_residual();
    let sigma2 = fit.sigma2_reml();

    let mut rows: Vec<AnovaRow> = design
        .term_labels
        .iter()
        .enumerate()
        .filter_map(|(t, label)| {
            let cols: Vec<usize> = (0..design.assign.len())
                .filter(|&j| design.assign[j] == Some(t))
                .collect();
            if cols.is_empty() {
                return None;
            }
            let df = cols.len() as f64;
            let sum_sq: f64 = cols.iter().map(|&j| effects[j].powi(2)).sum();
            let mean_sq = sum_sq / df;
            let f_value = mean_sq / sigma2;
            Some(AnovaRow {
                term: label.clone(),
                df,
                sum_sq,
                mean_sq,
                f_value: Some(f_value),
                p_value: Some(pvalue_f(f_value, df, df_res)),
            })
        })
        .collect();

    rows.push(AnovaRow {
        term: "Residuals".to_string(),
        df: df_res,
        sum_sq: fit.rss(),
        mean_sq: sigma2,
        f_value: None,
        p_value: None,
    });

    AnovaTable {
        response: fit.formula().response.clone(),
        rows,
    }
}

impl fmt::Display for AnovaTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analysis of Variance Table\n")?;
        writeln!(f, "Response: {}", self.response)?;

        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| {
                vec![
                    r.term.clone(),
                    format!("{}", r.df),
                    fmt_sig(r.sum_sq, 5),
                    fmt_sig(r.mean_sq, 5),
                    r.f_value.map_or(String::new(), |v| fmt_sig(v, 4)),
                    r.p_value.map_or(String::new(), fmt_pvalue),
                    r.p_value.map_or("", significance_stars).to_string(),
                ]
            })
            .collect();
        write!(
            f,
            "{}",
            render_table(&["", "Df", "Sum Sq", "Mean Sq", "F value", "Pr(>F)", ""], &body)
        )?;
        writeln!(f, "---\n{}", SIGNIFICANCE_LEGEND)
    }
}

// =============================================================================
// Nested model comparison
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonTest {
    F,
    Chisq,
}

/// One model in a comparison; change columns are relative to the row above.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub model: String,
    pub df_residual: f64,
    /// RSS for linear models, deviance for GLMs
    pub deviance: f64,
    pub df: Option<f64>,
    pub change: Option<f64>,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelComparison {
    pub test: ComparisonTest,
    /// "RSS" or "Deviance"
    pub measure: String,
    pub rows: Vec<ComparisonRow>,
}

/// F tests between nested linear models, listed from smallest to largest.
///
/// The denominator is σ̂² of the model with the fewest residual degrees of
/// freedom.
pub fn compare_lm(fits: &[&LmFit]) -> Result<ModelComparison> {
    check_models(fits.iter().map(|f| f.n_obs()))?;
    let entries: Vec<(String, f64, f64)> = fits
        .iter()
        .map(|f| (f.formula().text.clone(), f.df_residual(), f.rss()))
        .collect();
    let (scale, df_scale) = largest_model_scale(&entries, |i| fits[i].sigma2_reml());
    Ok(build_comparison(
        entries,
        ComparisonTest::F,
        "RSS",
        scale,
        df_scale,
    ))
}

/// Analysis of deviance between nested GLMs.
///
/// With known dispersion the scaled deviance changes are χ² tests; otherwise
/// they are F tests against the largest model's dispersion.
pub fn compare_glm(fits: &[&GlmFit]) -> Result<ModelComparison> {
    check_models(fits.iter().map(|f| f.n_obs()))?;
    let entries: Vec<(String, f64, f64)> = fits
        .iter()
        .map(|f| (f.formula().text.clone(), f.df_residual(), f.deviance()))
        .collect();
    let test = if fits.iter().all(|f| f.uses_z_tests()) {
        ComparisonTest::Chisq
    } else {
        ComparisonTest::F
    };
    let (scale, df_scale) = largest_model_scale(&entries, |i| fits[i].dispersion());
    Ok(build_comparison(entries, test, "Deviance", scale, df_scale))
}

fn check_models(n_obs: impl Iterator<Item = usize>) -> Result<()> {
    let n: Vec<usize> = n_obs.collect();
    if n.len() < 2 {
        return Err(RustyLmError::InvalidValue(
            "model comparison needs at least two models".to_string(),
        ));
    }
    if n.iter().any(|&k| k != n[0]) {
        return Err(RustyLmError::InvalidValue(format!(
            "models were fitted to different numbers of observations: {:?}",
            n
        )));
    }
    Ok(())
}

/// Scale and its residual df, taken from the model with the fewest residual df.
fn largest_model_scale(
    entries: &[(String, f64, f64)],
    scale_of: impl Fn(usize) -> f64,
) -> (f64, f64) {
    let big = entries
        .iter()
        .enumerate()
        .min_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
        .map_or(0, |(i, _)| i);
    (scale_of(big), entries[big].1)
}

fn build_comparison(
    entries: Vec<(String, f64, f64)>,
    test: ComparisonTest,
    measure: &str,
    scale: f64,
    df_scale: f64,
) -> ModelComparison {
    let mut rows = Vec::with_capacity(entries.len());
    let mut previous: Option<(f64, f64)> = None;

    for (model, df_residual, deviance) in entries {
        let (df, change, statistic, p_value) = match previous {
            Some((prev_df, prev_dev)) if prev_df != df_residual => {
                let df = prev_df - df_residual;
                let change = prev_dev - deviance;
                let (statistic, p_value) = match test {
                    ComparisonTest::F => {
                        let f = (change / df) / scale;
                        (f, pvalue_f(f, df.abs(), df_scale))
                    }
                    ComparisonTest::Chisq => {
                        let x = change / scale;
                        (x, pvalue_chi2(x.abs(), df.abs()))
                    }
                };
                (Some(df), Some(change), Some(statistic), Some(p_value))
            }
            Some((prev_df, prev_dev)) => {
                (Some(prev_df - df_residual), Some(prev_dev - deviance), None, None)
            }
            None => (None, None, None, None),
        };

        rows.push(ComparisonRow {
            model,
            df_residual,
            deviance,
            df,
            change,
            statistic,
            p_value,
        });
        previous = Some((df_residual, deviance));
    }

    ModelComparison {
        test,
        measure: measure.to_string(),
        rows,
    }
}

impl fmt::Display for ModelComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self.measure.as_str() {
            "RSS" => "Analysis of Variance Table",
            _ => "Analysis of Deviance Table",
        };
        writeln!(f, "{}\n", title)?;
        for (i, row) in self.rows.iter().enumerate() {
            writeln!(f, "Model {}: {}", i + 1, row.model)?;
        }

        let (stat_header, p_header) = match self.test {
            ComparisonTest::F => ("F", "Pr(>F)"),
            ComparisonTest::Chisq => ("Chisq", "Pr(>Chi)"),
        };
        let change_header = match self.measure.as_str() {
            "RSS" => "Sum of Sq",
            _ => "Deviance",
        };
        let resid_header = match self.measure.as_str() {
            "RSS" => "RSS",
            _ => "Resid. Dev",
        };

        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| {
                vec![
                    format!("{}", i + 1),
                    format!("{}", r.df_residual),
                    fmt_sig(r.deviance, 5),
                    r.df.map_or(String::new(), |v| format!("{}", v)),
                    r.change.map_or(String::new(), |v| fmt_sig(v, 5)),
                    r.statistic.map_or(String::new(), |v| fmt_sig(v, 4)),
                    r.p_value.map_or(String::new(), fmt_pvalue),
                    r.p_value.map_or("", significance_stars).to_string(),
                ]
            })
            .collect();
        write!(
            f,
            "{}",
            render_table(
                &["", "Res.Df", resid_header, "Df", change_header, stat_header, p_header, ""],
                &body
            )
        )?;
        writeln!(f, "---\n{}", SIGNIFICANCE_LEGEND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataFrame;
    use crate::models::{GeneralizedLinearModel, GlmOptions, LinearModel, LmOptions};
    use approx::assert_abs_diff_eq;

    fn grouped() -> DataFrame {
        DataFrame::new()
            .with_numeric("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0])
            .unwrap()
            .with_factor("g", &["a", "a", "a", "b", "b", "b", "c", "c", "c"])
            .unwrap()
            .with_numeric("y", vec![1.2, 2.1, 2.8, 5.1, 6.3, 6.8, 9.9, 10.2, 11.5])
            .unwrap()
    }

    #[test]
    fn test_sequential_sums_of_squares_add_up() {
        let fit = LinearModel::fit("y ~ x + g", &grouped(), &LmOptions::default()).unwrap();
        let table = anova(&fit);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].term, "x");
        assert_eq!(table.rows[1].df, 2.0);
        assert_eq!(table.rows[2].term, "Residuals");

        // Term SS + residual SS = total SS about the mean
        let y = fit.response();
        let mean = y.mean().unwrap();
        let tss: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
        let total: f64 = table.rows.iter().map(|r| r.sum_sq).sum();
        assert_abs_diff_eq!(total, tss, epsilon = 1e-8);
    }

    #[test]
    fn test_first_term_ss_matches_nested_rss_drop() {
        let data = grouped();
        let small = LinearModel::fit("y ~ 1", &data, &LmOptions::default()).unwrap();
        let big = LinearModel::fit("y ~ x + g", &data, &LmOptions::default()).unwrap();
        let with_x = LinearModel::fit("y ~ x", &data, &LmOptions::default()).unwrap();
        let table = anova(&big);
        assert_abs_diff_eq!(table.rows[0].sum_sq, small.rss() - with_x.rss(), epsilon = 1e-8);
    }

    #[test]
    fn test_compare_lm_single_term_matches_anova() {
        let data = grouped();
        let small = LinearModel::fit("y ~ x", &data, &LmOptions::default()).unwrap();
        let big = LinearModel::fit("y ~ x + g", &data, &LmOptions::default()).unwrap();
        let cmp = compare_lm(&[&small, &big]).unwrap();
        let table = anova(&big);

        assert_eq!(cmp.test, ComparisonTest::F);
        assert_eq!(cmp.rows[1].df, Some(2.0));
        assert_abs_diff_eq!(
            cmp.rows[1].statistic.unwrap(),
            table.rows[1].f_value.unwrap(),
            epsilon = 1e-8
        );
        assert!(cmp.rows[0].p_value.is_none());
    }

    #[test]
    fn test_compare_glm_poisson_uses_chisq() {
        let data = DataFrame::new()
            .with_numeric("x", vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap()
            .with_numeric("y", vec![1.0, 1.0, 3.0, 4.0, 7.0, 12.0])
            .unwrap();
        let options = GlmOptions {
            family: "poisson".to_string(),
            ..GlmOptions::default()
        };
        let null = GeneralizedLinearModel::fit("y ~ 1", &data, &options).unwrap();
        let full = GeneralizedLinearModel::fit("y ~ x", &data, &options).unwrap();
        let cmp = compare_glm(&[&null, &full]).unwrap();

        assert_eq!(cmp.test, ComparisonTest::Chisq);
        let drop = null.deviance() - full.deviance();
        assert_abs_diff_eq!(cmp.rows[1].change.unwrap(), drop, epsilon = 1e-10);
        assert_abs_diff_eq!(cmp.rows[1].p_value.unwrap(), pvalue_chi2(drop, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_compare_rejects_different_samples() {
        let data = grouped();
        let fit = LinearModel::fit("y ~ x", &data, &LmOptions::default()).unwrap();
        let shorter = DataFrame::new()
            .with_numeric("x", vec![1.0, 2.0, 3.0, 4.0])
            .unwrap()
            .with_numeric("y", vec![1.0, 2.5, 2.9, 4.2])
            .unwrap();
        let other = LinearModel::fit("y ~ x", &shorter, &LmOptions::default()).unwrap();
        assert!(compare_lm(&[&fit, &other]).is_err());
        assert!(compare_lm(&[&fit]).is_err());
    }

    #[test]
    fn test_display_mentions_terms() {
        let fit = LinearModel::fit("y ~ x + g", &grouped(), &LmOptions::default()).unwrap();
        let text = anova(&fit).to_string();
        assert!(text.contains("Response: y"));
        assert!(text.contains("Residuals"));
        assert!(text.contains("Pr(>F)"));
    }
}
