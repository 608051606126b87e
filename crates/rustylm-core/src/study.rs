// =============================================================================
// Monte Carlo Variance Study
// =============================================================================
//
// Repeatedly simulate y = a + b·x + ε, fit y ~ x, and compare what the fits
// report with what actually happened across replicates:
//
//   - the spread of the slope estimates against the average reported SE
//   - how often the confidence interval covers the true slope
//   - the average ML and REML variance estimates against their expectations
//
//         E[RSS / n]       = σ² (n - p) / n    (biased low)
//         E[RSS / (n - p)] = σ²
//
// Replicate i uses seed + i, so results do not depend on thread scheduling.
//
// =============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, RustyLmError};
use crate::inference::check_conf_level;
use crate::models::{LinearModel, LmOptions};
use crate::simulate::{simulate, uniform_predictor, Line, NormalErrors};

/// Parameters in y ~ x.
const N_PARAMS: usize = 2;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    /// Observations per replicate
    pub n: usize,
    pub line: Line,
    pub sigma: f64,
    pub replicates: usize,
    pub seed: u64,
    pub conf_level: f64,
    pub x_low: f64,
    pub x_high: f64,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            n: 20,
            line: Line::new(1.0, 2.0),
            sigma: 1.0,
            replicates: 1000,
            seed: 42,
            conf_level: 0.95,
            x_low: 0.0,
            x_high: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyReport {
    pub n: usize,
    pub replicates: usize,
    pub true_slope: f64,
    pub mean_slope: f64,
    /// Standard deviation of the slope estimates across replicates
    pub empirical_slope_sd: f64,
    /// Average of the per-fit standard errors
    pub mean_slope_se: f64,
    /// Share of confidence intervals containing the true slope
    pub ci_coverage: f64,
    pub mean_sigma2_ml: f64,
    pub mean_sigma2_reml: f64,
    pub expected_sigma2_ml: f64,
    pub expected_sigma2_reml: f64,
}

struct Replicate {
    slope: f64,
    slope_se: f64,
    covered: bool,
    sigma2_ml: f64,
    sigma2_reml: f64,
}

fn validate(config: &StudyConfig) -> Result<()> {
    if config.n <= N_PARAMS {
        return Err(RustyLmError::InvalidValue(format!(
            "study needs more than {} observations per replicate, got {}",
            N_PARAMS, config.n
        )));
    }
    if config.replicates == 0 {
        return Err(RustyLmError::InvalidValue(
            "study needs at least one replicate".to_string(),
        ));
    }
    check_conf_level(config.conf_level)
}

fn run_replicate(config: &StudyConfig, model: &NormalErrors, index: usize) -> Result<Replicate> {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(index as u64));
    let xs = uniform_predictor(config.n, config.x_low, config.x_high, &mut rng)?;
    let data = simulate(model, &xs, rng.gen())?;

    let options = LmOptions {
        conf_level: config.conf_level,
        ..LmOptions::default()
    };
    let fit = LinearModel::fit("y ~ x", &data, &options)?;
    let (low, high) = fit.confint(config.conf_level)?[1];
    let truth = config.line.slope;

    Ok(Replicate {
        slope: fit.coefficients()[1],
        slope_se: fit.std_errors()[1],
        covered: low <= truth && truth <= high,
        sigma2_ml: fit.sigma2_ml(),
        sigma2_reml: fit.sigma2_reml(),
    })
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    values.sum::<f64>() / n as f64
}

/// Run the study. Replicates are fitted in parallel.
pub fn run_variance_study(config: &StudyConfig) -> Result<StudyReport> {
    validate(config)?;
    let model = NormalErrors::new(config.line, config.sigma)?;
    info!(
        n = config.n,
        replicates = config.replicates,
        seed = config.seed,
        "running variance study"
    );

    let results: Vec<Replicate> = (0..config.replicates)
        .into_par_iter()
        .map(|i| run_replicate(config, &model, i))
        .collect::<Result<Vec<_>>>()?;

    let r = results.len();
    let mean_slope = mean(results.iter().map(|x| x.slope), r);
    let empirical_slope_sd = if r > 1 {
        let ss: f64 = results.iter().map(|x| (x.slope - mean_slope).powi(2)).sum();
        (ss / (r - 1) as f64).sqrt()
    } else {
        f64::NAN
    };

    let sigma2 = config.sigma * config.sigma;
    let n = config.n as f64;
    let report = StudyReport {
        n: config.n,
        replicates: r,
        true_slope: config.line.slope,
        mean_slope,
        empirical_slope_sd,
        mean_slope_se: mean(results.iter().map(|x| x.slope_se), r),
        ci_coverage: results.iter().filter(|x| x.covered).count() as f64 / r as f64,
        mean_sigma2_ml: mean(results.iter().map(|x| x.sigma2_ml), r),
        mean_sigma2_reml: mean(results.iter().map(|x| x.sigma2_reml), r),
        expected_sigma2_ml: sigma2 * (n - N_PARAMS as f64) / n,
        expected_sigma2_reml: sigma2,
    };
    info!(
        mean_sigma2_ml = report.mean_sigma2_ml,
        mean_sigma2_reml = report.mean_sigma2_reml,
        coverage = report.ci_coverage,
        "variance study finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn config(replicates: usize) -> StudyConfig {
        StudyConfig {
            n: 10,
            replicates,
            seed: 7,
            ..StudyConfig::default()
        }
    }

    #[test]
    fn test_same_seed_same_report() {
        let a = run_variance_study(&config(50)).unwrap();
        let b = run_variance_study(&config(50)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ml_is_reml_scaled_per_replicate() {
        // RSS/n = RSS/(n-p) · (n-p)/n holds fit by fit, so it holds on average
        let report = run_variance_study(&config(40)).unwrap();
        assert_abs_diff_eq!(
            report.mean_sigma2_ml,
            report.mean_sigma2_reml * 8.0 / 10.0,
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(report.expected_sigma2_ml, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_estimates_are_close_to_truth() {
        let report = run_variance_study(&config(2000)).unwrap();
        assert_abs_diff_eq!(report.mean_slope, 2.0, epsilon = 0.02);
        assert_abs_diff_eq!(report.mean_sigma2_reml, 1.0, epsilon = 0.05);
        assert_abs_diff_eq!(report.mean_sigma2_ml, 0.8, epsilon = 0.04);
        assert!(report.ci_coverage > 0.93 && report.ci_coverage < 0.97);
    }

    #[test]
    fn test_invalid_configs() {
        let mut c = config(10);
        c.n = 2;
        assert!(run_variance_study(&c).is_err());
        let mut c = config(0);
        c.n = 10;
        assert!(run_variance_study(&c).is_err());
        let mut c = config(10);
        c.sigma = 0.0;
        assert!(run_variance_study(&c).is_err());
    }

    #[test]
    fn test_config_from_json() {
        let c: StudyConfig = serde_json::from_str(r#"{"n": 30, "line": {"intercept": 0.0, "slope": 1.5}}"#).unwrap();
        assert_eq!(c.n, 30);
        assert_abs_diff_eq!(c.line.slope, 1.5, epsilon = 1e-12);
        assert_eq!(c.replicates, 1000);
    }
}
