//! rustylm: fit, summarise, diagnose and plot linear models from the command line.

mod commands;
mod config;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rustylm_core::{GlmOptions, Interval, Line, Scale, VarianceMethod};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{
    GlmArgs, LmArgs, OutputFormat, PlotArgs, PlotKind, SimModel, SimulateArgs,
};
use config::CliConfig;

#[derive(Parser)]
#[command(name = "rustylm")]
#[command(about = "Linear and generalized linear models with R-style formulas", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// JSON file with default options for lm, glm, study and plot
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ModelInput {
    /// CSV file with a header row
    #[arg(short, long)]
    data: PathBuf,

    /// Model formula, e.g. "y ~ x + C(group)"
    #[arg(short, long)]
    formula: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VarianceArg {
    Reml,
    Ml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum IntervalArg {
    None,
    Confidence,
    Prediction,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScaleArg {
    Link,
    Response,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate x/y data from a deterministic or stochastic model
    Simulate {
        #[arg(long, value_enum, default_value_t = SimModel::Normal)]
        model: SimModel,

        /// Number of observations
        #[arg(short, long, default_value = "50")]
        n: usize,

        #[arg(long, default_value = "1.0", allow_hyphen_values = true)]
        intercept: f64,

        #[arg(long, default_value = "2.0", allow_hyphen_values = true)]
        slope: f64,

        /// Error standard deviation (normal model)
        #[arg(long, default_value = "1.0")]
        sigma: f64,

        /// Gamma shape (gamma model)
        #[arg(long, default_value = "2.0")]
        shape: f64,

        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        x_low: f64,

        #[arg(long, default_value = "10.0", allow_hyphen_values = true)]
        x_high: f64,

        /// Add a factor `group` with this many levels (normal model only)
        #[arg(long)]
        groups: Option<usize>,

        /// Intercept shift between consecutive groups
        #[arg(long, default_value = "1.0", allow_hyphen_values = true)]
        group_effect: f64,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output CSV (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fit a linear model by least squares
    Lm {
        #[command(flatten)]
        input: ModelInput,

        /// Column of prior weights
        #[arg(short, long)]
        weights: Option<String>,

        #[arg(long, value_enum)]
        variance_method: Option<VarianceArg>,

        #[arg(long)]
        conf_level: Option<f64>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
        format: OutputFormat,

        /// Also print residual normality and collinearity checks
        #[arg(long)]
        check: bool,

        /// Predict for the rows of this CSV instead of printing the fit
        #[arg(long)]
        predict: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = IntervalArg::None)]
        interval: IntervalArg,
    },

    /// Fit a generalized linear model by IRLS
    Glm {
        #[command(flatten)]
        input: ModelInput,

        /// gaussian, poisson, binomial, gamma, inverse_gaussian
        #[arg(long)]
        family: Option<String>,

        /// identity, log, logit, inverse, inverse_squared
        #[arg(long)]
        link: Option<String>,

        #[arg(short, long)]
        weights: Option<String>,

        /// Column added to the linear predictor
        #[arg(long)]
        offset: Option<String>,

        #[arg(long)]
        max_iter: Option<usize>,

        #[arg(long)]
        tol: Option<f64>,

        #[arg(long)]
        conf_level: Option<f64>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
        format: OutputFormat,

        #[arg(long)]
        predict: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = ScaleArg::Response)]
        scale: ScaleArg,
    },

    /// Sequential ANOVA for one formula, nested-model tests for several
    Anova {
        #[arg(short, long)]
        data: PathBuf,

        /// Repeat for nested comparisons, smallest model first
        #[arg(short, long, required = true)]
        formula: Vec<String>,

        /// Compare GLMs of this family (analysis of deviance)
        #[arg(long)]
        family: Option<String>,
    },

    /// Write SVG plots of a fitted model
    Plot {
        #[command(flatten)]
        input: ModelInput,

        #[arg(long, value_enum, default_value_t = PlotKind::Diagnostics)]
        kind: PlotKind,

        /// Predictor on the horizontal axis of a fit plot
        #[arg(long)]
        predictor: Option<String>,

        /// Fit a GLM of this family instead of a linear model
        #[arg(long)]
        family: Option<String>,

        /// SVG file for fit plots, directory for diagnostics
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,
    },

    /// Monte Carlo comparison of ML and REML variance estimates
    Study {
        #[arg(short, long)]
        n: Option<usize>,

        #[arg(long)]
        replicates: Option<usize>,

        #[arg(long)]
        sigma: Option<f64>,

        #[arg(long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Walk through the full workflow on simulated data
    Demo {
        #[arg(short, long, default_value = "30")]
        n: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Directory for the demo's plots
        #[arg(long)]
        plots: Option<PathBuf>,
    },
}

fn glm_options(base: &GlmOptions, family: Option<String>, link: Option<String>) -> GlmOptions {
    let mut options = base.clone();
    if let Some(family) = family {
        options.family = family;
        // A link from the config file belongs to the config file's family
        options.link = None;
    }
    if link.is_some() {
        options.link = link;
    }
    options
}

fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let config: CliConfig = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            model,
            n,
            intercept,
            slope,
            sigma,
            shape,
            x_low,
            x_high,
            groups,
            group_effect,
            seed,
            output,
        } => {
            let args = SimulateArgs {
                model,
                n,
                line: Line::new(intercept, slope),
                sigma,
                shape,
                x_range: (x_low, x_high),
                groups,
                group_effect,
                seed,
            };
            commands::run_simulate(out, &args, output.as_deref())
        }

        Commands::Lm {
            input,
            weights,
            variance_method,
            conf_level,
            format,
            check,
            predict,
            interval,
        } => {
            let mut options = config.lm.clone();
            if weights.is_some() {
                options.weights = weights;
            }
            if let Some(method) = variance_method {
                options.variance_method = match method {
                    VarianceArg::Reml => VarianceMethod::Reml,
                    VarianceArg::Ml => VarianceMethod::Ml,
                };
            }
            if let Some(level) = conf_level {
                options.conf_level = level;
            }
            let interval = match interval {
                IntervalArg::None => Interval::None,
                IntervalArg::Confidence => Interval::Confidence,
                IntervalArg::Prediction => Interval::Prediction,
            };
            commands::run_lm(
                out,
                &LmArgs {
                    data: &input.data,
                    formula: &input.formula,
                    options,
                    format,
                    check,
                    predict: predict.as_deref(),
                    interval,
                },
            )
        }

        Commands::Glm {
            input,
            family,
            link,
            weights,
            offset,
            max_iter,
            tol,
            conf_level,
            format,
            predict,
            scale,
        } => {
            let mut options = glm_options(&config.glm, family, link);
            if weights.is_some() {
                options.weights = weights;
            }
            if offset.is_some() {
                options.offset = offset;
            }
            if let Some(max_iter) = max_iter {
                options.irls.max_iterations = max_iter;
            }
            if let Some(tol) = tol {
                options.irls.tolerance = tol;
            }
            if let Some(level) = conf_level {
                options.conf_level = level;
            }
            let scale = match scale {
                ScaleArg::Link => Scale::Link,
                ScaleArg::Response => Scale::Response,
            };
            commands::run_glm(
                out,
                &GlmArgs {
                    data: &input.data,
                    formula: &input.formula,
                    options,
                    format,
                    predict: predict.as_deref(),
                    scale,
                },
            )
        }

        Commands::Anova {
            data,
            formula,
            family,
        } => {
            let glm = family.map(|f| glm_options(&config.glm, Some(f), None));
            commands::run_anova(out, &data, &formula, &config.lm, glm.as_ref())
        }

        Commands::Plot {
            input,
            kind,
            predictor,
            family,
            output,
            width,
            height,
        } => {
            let mut size = config.plot;
            if let Some(w) = width {
                size.width = w;
            }
            if let Some(h) = height {
                size.height = h;
            }
            commands::run_plot(
                out,
                &PlotArgs {
                    data: &input.data,
                    formula: &input.formula,
                    kind,
                    predictor: predictor.as_deref(),
                    glm: family.map(|f| glm_options(&config.glm, Some(f), None)),
                    lm: config.lm.clone(),
                    output: &output,
                    size,
                },
            )
        }

        Commands::Study {
            n,
            replicates,
            sigma,
            seed,
            json,
        } => {
            let mut study = config.study.clone();
            if let Some(n) = n {
                study.n = n;
            }
            if let Some(r) = replicates {
                study.replicates = r;
            }
            if let Some(s) = sigma {
                study.sigma = s;
            }
            if let Some(s) = seed {
                study.seed = s;
            }
            commands::run_study(out, &study, json)
        }

        Commands::Demo { n, seed, plots } => {
            commands::run_demo(out, n, seed, plots.as_deref(), config.plot)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn run_args(args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("rustylm").chain(args.iter().copied()))?;
        let mut buf = Vec::new();
        run(cli, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    fn simulated_csv(dir: &Path, extra: &[&str]) -> PathBuf {
        let path = dir.join("data.csv");
        let p = path.to_string_lossy().to_string();
        let mut args = vec!["simulate", "-n", "40", "--seed", "3", "-o", p.as_str()];
        args.extend_from_slice(extra);
        run_args(&args).unwrap();
        path
    }

    #[test]
    fn test_simulate_to_stdout() {
        let text = run_args(&["simulate", "-n", "5", "--model", "deterministic"]).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("x,y"));
        assert_eq!(lines.count(), 5);
    }

    #[test]
    fn test_lm_summary_and_tidy() {
        let dir = tempdir().unwrap();
        let data = simulated_csv(dir.path(), &[]);
        let d = data.to_str().unwrap();

        let summary = run_args(&["lm", "-d", d, "-f", "y ~ x"]).unwrap();
        assert!(summary.contains("Residual standard error"));
        assert!(summary.contains("on 38 degrees of freedom"));

        let tidy = run_args(&["lm", "-d", d, "-f", "y ~ x", "--format", "tidy"]).unwrap();
        let rows: Vec<&str> = tidy.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].starts_with("(Intercept),"));
        assert!(rows[2].starts_with("x,"));
    }

    #[test]
    fn test_lm_check_prints_normality_test() {
        let dir = tempdir().unwrap();
        let data = simulated_csv(dir.path(), &[]);
        let text = run_args(&["lm", "-d", data.to_str().unwrap(), "-f", "y ~ x", "--check"]).unwrap();
        assert!(text.contains("Jarque-Bera"));
    }

    #[test]
    fn test_glm_json_output() {
        let dir = tempdir().unwrap();
        let data = simulated_csv(dir.path(), &["--model", "poisson", "--slope", "0.1"]);
        let text = run_args(&[
            "glm",
            "-d",
            data.to_str().unwrap(),
            "-f",
            "y ~ x",
            "--family",
            "poisson",
            "--format",
            "json",
        ])
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["tidy"].as_array().unwrap().len(), 2);
        assert_eq!(value["glance"]["dispersion"], 1.0);
    }

    #[test]
    fn test_anova_compares_nested_models() {
        let dir = tempdir().unwrap();
        let data = simulated_csv(dir.path(), &["--groups", "3"]);
        let d = data.to_str().unwrap();
        let text = run_args(&["anova", "-d", d, "-f", "y ~ x", "-f", "y ~ x + group"]).unwrap();
        assert!(text.contains("RSS"));
        let single = run_args(&["anova", "-d", d, "-f", "y ~ x + group"]).unwrap();
        assert!(single.contains("Residuals"));
    }

    #[test]
    fn test_plot_writes_svg_files() {
        let dir = tempdir().unwrap();
        let data = simulated_csv(dir.path(), &[]);
        let plots = dir.path().join("plots");
        run_args(&[
            "plot",
            "-d",
            data.to_str().unwrap(),
            "-f",
            "y ~ x",
            "-o",
            plots.to_str().unwrap(),
        ])
        .unwrap();
        let svg = fs::read_to_string(plots.join("normal_q_q.svg")).unwrap();
        assert!(svg.starts_with("<svg"));
        assert_eq!(fs::read_dir(&plots).unwrap().count(), 4);
    }

    #[test]
    fn test_config_file_sets_defaults_and_flags_override() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("config.json");
        fs::write(&config, r#"{"study": {"n": 12, "replicates": 20, "seed": 5}}"#).unwrap();
        let c = config.to_str().unwrap();

        let text = run_args(&["--config", c, "study", "--json"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["n"], 12);
        assert_eq!(value["replicates"], 20);

        let text = run_args(&["--config", c, "study", "--json", "--replicates", "10"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["replicates"], 10);
    }

    #[test]
    fn test_missing_data_file_is_reported() {
        let err = run_args(&["lm", "-d", "/nonexistent/data.csv", "-f", "y ~ x"]).unwrap_err();
        assert!(format!("{:#}", err).contains("reading data"));
    }

    #[test]
    fn test_demo_runs() {
        let text = run_args(&["demo", "-n", "20"]).unwrap();
        assert!(text.contains("Deterministic model"));
        assert!(text.contains("Analysis of Variance Table"));
        assert!(text.contains("poisson"));
    }
}
