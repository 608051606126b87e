//! One function per subcommand. Everything is written to `out` so the
//! commands can be driven from tests.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use rustylm_core::diagnostics::{compute_vif, jarque_bera};
use rustylm_core::plot::{diagnostic_plots, fit_plot, Plot};
use rustylm_core::simulate::{
    balanced_groups, linspace, simulate, simulate_grouped, uniform_predictor, Deterministic,
    GammaResponse, NormalErrors, PoissonCounts, ResponseModel,
};
use rustylm_core::tidy::format::{fmt_pvalue, fmt_sig, render_table};
use rustylm_core::tidy::{to_json, write_csv, Glance, Tidy, TidyRow};
use rustylm_core::{
    anova, compare_glm, compare_lm, run_variance_study, DataFrame, GeneralizedLinearModel,
    GlmFit, GlmOptions, Interval, LikelihoodKind, Line, LinearModel, LmFit, LmOptions, Scale,
    StudyConfig, StudyReport,
};

use crate::config::PlotConfig;

// =============================================================================
// Shared
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// R-style printed summary
    Summary,
    /// One CSV row per coefficient
    Tidy,
    /// One CSV row of fit statistics
    Glance,
    /// One CSV row per observation
    Augment,
    /// tidy + glance as JSON
    Json,
}

#[derive(Serialize)]
struct FitReport {
    tidy: Vec<TidyRow>,
    glance: Glance,
}

pub fn load_data(path: &Path) -> Result<DataFrame> {
    let data = DataFrame::from_csv_path(path)
        .with_context(|| format!("reading data from {}", path.display()))?;
    info!(rows = data.n_rows(), columns = data.n_cols(), "loaded {}", path.display());
    Ok(data)
}

fn write_fit<M: Tidy>(
    out: &mut dyn Write,
    fit: &M,
    summary: impl FnOnce() -> Result<String>,
    format: OutputFormat,
    conf_level: f64,
) -> Result<()> {
    match format {
        OutputFormat::Summary => writeln!(out, "{}", summary()?)?,
        OutputFormat::Tidy => write_csv(&fit.tidy(conf_level)?, &mut *out)?,
        OutputFormat::Glance => write_csv(&[fit.glance()], &mut *out)?,
        OutputFormat::Augment => write_csv(&fit.augment(), &mut *out)?,
        OutputFormat::Json => {
            let report = FitReport {
                tidy: fit.tidy(conf_level)?,
                glance: fit.glance(),
            };
            writeln!(out, "{}", to_json(&report)?)?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PredictionRow {
    row: usize,
    fit: f64,
    se_fit: f64,
    lower: Option<f64>,
    upper: Option<f64>,
}

// =============================================================================
// simulate
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SimModel {
    /// y = a + b·x exactly
    Deterministic,
    /// y = a + b·x + N(0, σ²)
    Normal,
    /// y ~ Poisson(exp(a + b·x))
    Poisson,
    /// y ~ Gamma(shape) with mean exp(a + b·x)
    Gamma,
}

pub struct SimulateArgs {
    pub model: SimModel,
    pub n: usize,
    pub line: Line,
    pub sigma: f64,
    pub shape: f64,
    pub x_range: (f64, f64),
    pub groups: Option<usize>,
    pub group_effect: f64,
    pub seed: u64,
}

pub fn simulate_data(args: &SimulateArgs) -> Result<DataFrame> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let xs = uniform_predictor(args.n, args.x_range.0, args.x_range.1, &mut rng)?;
    let response_seed = args.seed.wrapping_add(1);

    if let Some(k) = args.groups {
        if args.model != SimModel::Normal {
            bail!("--groups is only supported for the normal model");
        }
        let model = NormalErrors::new(args.line, args.sigma)?;
        let shifts: Vec<f64> = (0..k).map(|g| g as f64 * args.group_effect).collect();
        let groups = balanced_groups(args.n, k);
        return Ok(simulate_grouped(&model, &xs, &groups, &shifts, response_seed)?);
    }

    let model: Box<dyn ResponseModel> = match args.model {
        SimModel::Deterministic => Box::new(Deterministic(args.line)),
        SimModel::Normal => Box::new(NormalErrors::new(args.line, args.sigma)?),
        SimModel::Poisson => Box::new(PoissonCounts { line: args.line }),
        SimModel::Gamma => Box::new(GammaResponse::new(args.line, args.shape)?),
    };
    info!(model = model.name(), n = args.n, seed = args.seed, "simulating");
    Ok(simulate(model.as_ref(), &xs, response_seed)?)
}

pub fn run_simulate(out: &mut dyn Write, args: &SimulateArgs, output: Option<&Path>) -> Result<()> {
    let data = simulate_data(args)?;
    match output {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            data.to_csv_writer(file)?;
            writeln!(out, "wrote {} rows to {}", data.n_rows(), path.display())?;
        }
        None => data.to_csv_writer(&mut *out)?,
    }
    Ok(())
}

// =============================================================================
// lm / glm
// =============================================================================

pub struct LmArgs<'a> {
    pub data: &'a Path,
    pub formula: &'a str,
    pub options: LmOptions,
    pub format: OutputFormat,
    pub check: bool,
    pub predict: Option<&'a Path>,
    pub interval: Interval,
}

pub fn run_lm(out: &mut dyn Write, args: &LmArgs) -> Result<()> {
    let data = load_data(args.data)?;
    let fit = LinearModel::fit(args.formula, &data, &args.options)
        .with_context(|| format!("fitting lm({})", args.formula))?;

    if let Some(path) = args.predict {
        let new_data = load_data(path)?;
        let pred = fit.predict(&new_data, args.interval, args.options.conf_level)?;
        let rows: Vec<PredictionRow> = (0..pred.fit.len())
            .map(|i| PredictionRow {
                row: pred.rows[i] + 1,
                fit: pred.fit[i],
                se_fit: pred.se_fit[i],
                lower: pred.lower.as_ref().map(|l| l[i]),
                upper: pred.upper.as_ref().map(|u| u[i]),
            })
            .collect();
        write_csv(&rows, &mut *out)?;
        return Ok(());
    }

    write_fit(
        out,
        &fit,
        || Ok(fit.summary()?.to_string()),
        args.format,
        args.options.conf_level,
    )?;
    if args.check {
        write_checks(out, &fit)?;
    }
    Ok(())
}

/// Residual normality and collinearity checks.
fn write_checks(out: &mut dyn Write, fit: &LmFit) -> Result<()> {
    let jb = jarque_bera(&fit.residuals().to_vec())?;
    writeln!(
        out,
        "\nJarque-Bera normality test: JB = {}, df = 2, p-value = {}",
        fmt_sig(jb.statistic, 4),
        fmt_pvalue(jb.p_value)
    )?;
    writeln!(
        out,
        "  skewness = {}, excess kurtosis = {}",
        fmt_sig(jb.skewness, 4),
        fmt_sig(jb.kurtosis, 4)
    )?;

    if fit.design().term_labels.len() > 1 {
        let vifs = compute_vif(fit.design())?;
        let rows: Vec<Vec<String>> = vifs
            .iter()
            .map(|(name, v)| vec![name.clone(), fmt_sig(*v, 4)])
            .collect();
        writeln!(out, "\nVariance inflation factors:")?;
        write!(out, "{}", render_table(&["", "VIF"], &rows))?;
    }
    Ok(())
}

pub struct GlmArgs<'a> {
    pub data: &'a Path,
    pub formula: &'a str,
    pub options: GlmOptions,
    pub format: OutputFormat,
    pub predict: Option<&'a Path>,
    pub scale: Scale,
}

pub fn run_glm(out: &mut dyn Write, args: &GlmArgs) -> Result<()> {
    let data = load_data(args.data)?;
    let fit = GeneralizedLinearModel::fit(args.formula, &data, &args.options)
        .with_context(|| format!("fitting glm({})", args.formula))?;

    if let Some(path) = args.predict {
        let new_data = load_data(path)?;
        let pred = fit.predict(&new_data, args.scale)?;
        let rows: Vec<PredictionRow> = (0..pred.fit.len())
            .map(|i| PredictionRow {
                row: pred.rows[i] + 1,
                fit: pred.fit[i],
                se_fit: pred.se_fit[i],
                lower: None,
                upper: None,
            })
            .collect();
        write_csv(&rows, &mut *out)?;
        return Ok(());
    }

    write_fit(
        out,
        &fit,
        || Ok(fit.summary()?.to_string()),
        args.format,
        args.options.conf_level,
    )
}

// =============================================================================
// anova
// =============================================================================

pub fn run_anova(
    out: &mut dyn Write,
    data: &Path,
    formulas: &[String],
    lm_options: &LmOptions,
    glm_options: Option<&GlmOptions>,
) -> Result<()> {
    let data = load_data(data)?;
    match glm_options {
        None => {
            let fits = formulas
                .iter()
                .map(|f| {
                    LinearModel::fit(f, &data, lm_options)
                        .with_context(|| format!("fitting lm({})", f))
                })
                .collect::<Result<Vec<LmFit>>>()?;
            if let [fit] = fits.as_slice() {
                write!(out, "{}", anova(fit))?;
            } else {
                let refs: Vec<&LmFit> = fits.iter().collect();
                write!(out, "{}", compare_lm(&refs)?)?;
            }
        }
        Some(options) => {
            let fits = formulas
                .iter()
                .map(|f| {
                    GeneralizedLinearModel::fit(f, &data, options)
                        .with_context(|| format!("fitting glm({})", f))
                })
                .collect::<Result<Vec<GlmFit>>>()?;
            let refs: Vec<&GlmFit> = fits.iter().collect();
            write!(out, "{}", compare_glm(&refs)?)?;
        }
    }
    Ok(())
}

// =============================================================================
// plot
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PlotKind {
    /// Data with the fitted line (single numeric predictor)
    Fit,
    /// The four residual diagnostic plots
    Diagnostics,
}

pub struct PlotArgs<'a> {
    pub data: &'a Path,
    pub formula: &'a str,
    pub kind: PlotKind,
    pub predictor: Option<&'a str>,
    pub glm: Option<GlmOptions>,
    pub lm: LmOptions,
    pub output: &'a Path,
    pub size: PlotConfig,
}

fn file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    stem.split('_').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("_")
}

fn write_plots(out: &mut dyn Write, plots: &[Plot], dir: &Path, size: PlotConfig) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::new();
    for plot in plots {
        let path = dir.join(format!("{}.svg", file_stem(&plot.title)));
        let svg = plot.to_svg(size.width, size.height)?;
        fs::write(&path, svg).with_context(|| format!("writing {}", path.display()))?;
        writeln!(out, "wrote {}", path.display())?;
        written.push(path);
    }
    Ok(written)
}

pub fn run_plot(out: &mut dyn Write, args: &PlotArgs) -> Result<()> {
    let data = load_data(args.data)?;
    match (args.kind, &args.glm) {
        (PlotKind::Fit, Some(_)) => bail!("fit plots are only available for linear models"),
        (PlotKind::Fit, None) => {
            let fit = LinearModel::fit(args.formula, &data, &args.lm)?;
            let predictor = match args.predictor {
                Some(p) => p.to_string(),
                None => match fit.formula().predictor_names().first() {
                    Some(p) => p.clone(),
                    None => bail!("the model has no predictor to plot against"),
                },
            };
            let plot = fit_plot(&fit, &data, &predictor)?;
            let svg = plot.to_svg(args.size.width, args.size.height)?;
            fs::write(args.output, svg)
                .with_context(|| format!("writing {}", args.output.display()))?;
            writeln!(out, "wrote {}", args.output.display())?;
        }
        (PlotKind::Diagnostics, None) => {
            let fit = LinearModel::fit(args.formula, &data, &args.lm)?;
            write_plots(out, &diagnostic_plots(&fit)?, args.output, args.size)?;
        }
        (PlotKind::Diagnostics, Some(options)) => {
            let fit = GeneralizedLinearModel::fit(args.formula, &data, options)?;
            write_plots(out, &diagnostic_plots(&fit)?, args.output, args.size)?;
        }
    }
    Ok(())
}

// =============================================================================
// study
// =============================================================================

pub fn format_study(report: &StudyReport) -> String {
    let row = |name: &str, value: f64, expected: Option<f64>| {
        vec![
            name.to_string(),
            fmt_sig(value, 5),
            expected.map(|e| fmt_sig(e, 5)).unwrap_or_default(),
        ]
    };
    let rows = vec![
        row("slope", report.mean_slope, Some(report.true_slope)),
        row("slope SD", report.empirical_slope_sd, None),
        row("mean slope SE", report.mean_slope_se, Some(report.empirical_slope_sd)),
        row("CI coverage", report.ci_coverage, None),
        row("sigma2 (ML, RSS/n)", report.mean_sigma2_ml, Some(report.expected_sigma2_ml)),
        row(
            "sigma2 (REML, RSS/(n-p))",
            report.mean_sigma2_reml,
            Some(report.expected_sigma2_reml),
        ),
    ];
    format!(
        "Variance study: n = {}, {} replicates\n\n{}",
        report.n,
        report.replicates,
        render_table(&["", "mean", "expected"], &rows)
    )
}

pub fn run_study(out: &mut dyn Write, config: &StudyConfig, json: bool) -> Result<()> {
    let report = run_variance_study(config)?;
    if json {
        writeln!(out, "{}", to_json(&report)?)?;
    } else {
        write!(out, "{}", format_study(&report))?;
    }
    Ok(())
}

// =============================================================================
// demo
// =============================================================================

/// The whole workflow on simulated data: deterministic vs stochastic models,
/// OLS vs Gaussian ML, ML vs REML variance, a grouped model with ANOVA, and
/// a Poisson GLM.
pub fn run_demo(out: &mut dyn Write, n: usize, seed: u64, plot_dir: Option<&Path>, size: PlotConfig) -> Result<()> {
    let line = Line::new(1.0, 2.0);
    let options = LmOptions::default();

    writeln!(out, "== Deterministic model: y = 1 + 2x ==")?;
    let xs = linspace(0.0, 10.0, n);
    let exact = simulate(&Deterministic(line), &xs, seed)?;
    let fit = LinearModel::fit("y ~ x", &exact, &options)?;
    writeln!(
        out,
        "intercept = {}, slope = {}, RSS = {}\n",
        fmt_sig(fit.coefficients()[0], 6),
        fmt_sig(fit.coefficients()[1], 6),
        fmt_sig(fit.rss(), 3)
    )?;

    writeln!(out, "== Stochastic model: y = 1 + 2x + N(0, 1) ==")?;
    let args = SimulateArgs {
        model: SimModel::Normal,
        n,
        line,
        sigma: 1.0,
        shape: 1.0,
        x_range: (0.0, 10.0),
        groups: None,
        group_effect: 0.0,
        seed,
    };
    let noisy = simulate_data(&args)?;
    let ols = LinearModel::fit("y ~ x", &noisy, &options)?;
    writeln!(out, "{}\n", ols.summary()?)?;

    writeln!(out, "== OLS vs Gaussian maximum likelihood ==")?;
    let ml = GeneralizedLinearModel::fit("y ~ x", &noisy, &GlmOptions::default())?;
    let max_diff = ols
        .coefficients()
        .iter()
        .zip(ml.coefficients())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    writeln!(out, "largest coefficient difference: {}", fmt_sig(max_diff, 3))?;
    writeln!(
        out,
        "sigma2 ML (RSS/n) = {}, REML (RSS/(n-p)) = {}",
        fmt_sig(ols.sigma2_ml(), 5),
        fmt_sig(ols.sigma2_reml(), 5)
    )?;
    writeln!(
        out,
        "logLik ML = {}, REML = {}, AIC = {}, BIC = {}\n",
        fmt_sig(ols.log_likelihood(LikelihoodKind::Ml), 6),
        fmt_sig(ols.log_likelihood(LikelihoodKind::Reml), 6),
        fmt_sig(ols.aic(), 6),
        fmt_sig(ols.bic(), 6)
    )?;

    writeln!(out, "== Grouped data: common slope, shifted intercepts ==")?;
    let grouped = simulate_data(&SimulateArgs {
        groups: Some(3),
        group_effect: 1.5,
        seed: seed.wrapping_add(100),
        ..args
    })?;
    let small = LinearModel::fit("y ~ x", &grouped, &options)?;
    let full = LinearModel::fit("y ~ x + group", &grouped, &options)?;
    writeln!(out, "{}", anova(&full))?;
    writeln!(out, "{}", compare_lm(&[&small, &full])?)?;

    writeln!(out, "== Poisson counts: log(mu) = 0.5 + 0.2x ==")?;
    let counts = simulate_data(&SimulateArgs {
        model: SimModel::Poisson,
        line: Line::new(0.5, 0.2),
        seed: seed.wrapping_add(200),
        ..args
    })?;
    let poisson = GeneralizedLinearModel::fit(
        "y ~ x",
        &counts,
        &GlmOptions {
            family: "poisson".to_string(),
            ..GlmOptions::default()
        },
    )?;
    writeln!(out, "{}", poisson.summary()?)?;

    if let Some(dir) = plot_dir {
        let mut plots = vec![fit_plot(&ols, &noisy, "x")?];
        plots.extend(diagnostic_plots(&ols)?);
        write_plots(out, &plots, dir, size)?;
    }
    Ok(())
}
