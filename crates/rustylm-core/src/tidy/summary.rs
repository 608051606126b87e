//! Printed model summaries in the layout of R's `summary.lm` / `summary.glm`.

use std::fmt;

use super::format::{fmt_pvalue, fmt_sig, render_table};
use super::{Tidy, TidyRow};
use crate::diagnostics::five_number_summary;
use crate::error::Result;
use crate::inference::{significance_stars, SIGNIFICANCE_LEGEND};
use crate::models::{FStatistic, GlmFit, LmFit, VarianceMethod};

/// Snapshot of everything `summary(lm)` prints.
#[derive(Debug, Clone)]
pub struct LmSummary {
    pub formula: String,
    pub residual_quantiles: [f64; 5],
    pub coefficients: Vec<TidyRow>,
    pub variance_method: VarianceMethod,
    pub sigma: f64,
    pub df_residual: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: Option<FStatistic>,
    pub n_dropped: usize,
}

/// Snapshot of everything `summary(glm)` prints.
#[derive(Debug, Clone)]
pub struct GlmSummary {
    pub formula: String,
    pub family: String,
    pub link: String,
    pub deviance_residual_quantiles: [f64; 5],
    pub coefficients: Vec<TidyRow>,
    pub z_tests: bool,
    pub dispersion: f64,
    pub dispersion_fixed: bool,
    pub null_deviance: f64,
    pub df_null: f64,
    pub deviance: f64,
    pub df_residual: f64,
    pub aic: f64,
    pub iterations: usize,
    pub converged: bool,
    pub n_dropped: usize,
}

impl LmFit {
    pub fn summary(&self) -> Result<LmSummary> {
        Ok(LmSummary {
            formula: self.formula().text.clone(),
            residual_quantiles: five_number_summary(&self.weighted_residuals().to_vec()),
            coefficients: self.tidy(self.conf_level())?,
            variance_method: self.variance_method(),
            sigma: self.sigma(),
            df_residual: self.df_residual(),
            r_squared: self.r_squared(),
            adj_r_squared: self.adj_r_squared(),
            f_statistic: self.f_statistic(),
            n_dropped: self.design().n_dropped,
        })
    }
}

impl GlmFit {
    pub fn summary(&self) -> Result<GlmSummary> {
        Ok(GlmSummary {
            formula: self.formula().text.clone(),
            family: self.family().name().to_string(),
            link: self.link().name().to_string(),
            deviance_residual_quantiles: five_number_summary(&self.deviance_residuals().to_vec()),
            coefficients: self.tidy(self.conf_level())?,
            z_tests: self.uses_z_tests(),
            dispersion: self.dispersion(),
            dispersion_fixed: self.family().dispersion_is_fixed(),
            null_deviance: self.null_deviance(),
            df_null: self.df_null(),
            deviance: self.deviance(),
            df_residual: self.df_residual(),
            aic: self.aic(),
            iterations: self.iterations(),
            converged: self.converged(),
            n_dropped: self.design().n_dropped,
        })
    }
}

fn write_quantiles(f: &mut fmt::Formatter<'_>, title: &str, q: &[f64; 5]) -> fmt::Result {
    const LABELS: [&str; 5] = ["Min", "1Q", "Median", "3Q", "Max"];
    writeln!(f, "{}:", title)?;
    let values: Vec<String> = q.iter().map(|v| fmt_sig(*v, 4)).collect();
    let widths: Vec<usize> = LABELS
        .iter()
        .zip(&values)
        .map(|(h, v)| h.len().max(v.len()))
        .collect();
    let header: Vec<String> = LABELS
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:>w$}", h, w = w))
        .collect();
    let cells: Vec<String> = values
        .iter()
        .zip(&widths)
        .map(|(v, w)| format!("{:>w$}", v, w = w))
        .collect();
    writeln!(f, "{}", header.join(" "))?;
    writeln!(f, "{}\n", cells.join(" "))
}

fn write_coefficients(
    f: &mut fmt::Formatter<'_>,
    rows: &[TidyRow],
    stat_name: &str,
    p_name: &str,
) -> fmt::Result {
    writeln!(f, "Coefficients:")?;
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.term.clone(),
                fmt_sig(r.estimate, 5),
                fmt_sig(r.std_error, 5),
                fmt_sig(r.statistic, 3),
                fmt_pvalue(r.p_value),
                significance_stars(r.p_value).to_string(),
            ]
        })
        .collect();
    write!(
        f,
        "{}",
        render_table(&["", "Estimate", "Std. Error", stat_name, p_name, ""], &body)
    )?;
    writeln!(f, "---\n{}\n", SIGNIFICANCE_LEGEND)
}

impl fmt::Display for LmSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Call:\nlm(formula = {})\n", self.formula)?;
        write_quantiles(f, "Residuals", &self.residual_quantiles)?;
        write_coefficients(f, &self.coefficients, "t value", "Pr(>|t|)")?;

        let label = match self.variance_method {
            VarianceMethod::Reml => "Residual standard error",
            VarianceMethod::Ml => "Residual standard error (ML)",
        };
        writeln!(
            f,
            "{}: {} on {} degrees of freedom",
            label,
            fmt_sig(self.sigma, 4),
            self.df_residual
        )?;
        if self.n_dropped > 0 {
            writeln!(f, "  ({} observations deleted due to missingness)", self.n_dropped)?;
        }
        writeln!(
            f,
            "Multiple R-squared:  {},\tAdjusted R-squared:  {}",
            fmt_sig(self.r_squared, 4),
            fmt_sig(self.adj_r_squared, 4)
        )?;
        if let Some(fs) = &self.f_statistic {
            writeln!(
                f,
                "F-statistic: {} on {} and {} DF,  p-value: {}",
                fmt_sig(fs.value, 4),
                fs.df_num,
                fs.df_den,
                fmt_pvalue(fs.p_value)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for GlmSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Call:\nglm(formula = {}, family = {}(link = \"{}\"))\n",
            self.formula, self.family, self.link
        )?;
        write_quantiles(f, "Deviance Residuals", &self.deviance_residual_quantiles)?;
        let (stat, p) = if self.z_tests {
            ("z value", "Pr(>|z|)")
        } else {
            ("t value", "Pr(>|t|)")
        };
        write_coefficients(f, &self.coefficients, stat, p)?;

        if self.dispersion_fixed {
            writeln!(
                f,
                "(Dispersion parameter for {} family taken to be 1)\n",
                self.family
            )?;
        } else {
            writeln!(
                f,
                "(Dispersion parameter for {} family taken to be {})\n",
                self.family,
                fmt_sig(self.dispersion, 6)
            )?;
        }

        writeln!(
            f,
            "    Null deviance: {}  on {}  degrees of freedom",
            fmt_sig(self.null_deviance, 5),
            self.df_null
        )?;
        writeln!(
            f,
            "Residual deviance: {}  on {}  degrees of freedom",
            fmt_sig(self.deviance, 5),
            self.df_residual
        )?;
        if self.n_dropped > 0 {
            writeln!(f, "  ({} observations deleted due to missingness)", self.n_dropped)?;
        }
        writeln!(f, "AIC: {}\n", fmt_sig(self.aic, 5))?;
        write!(f, "Number of Fisher Scoring iterations: {}", self.iterations)?;
        if !self.converged {
            write!(f, " (did not converge)")?;
        }
        writeln!(f)
    }
}
