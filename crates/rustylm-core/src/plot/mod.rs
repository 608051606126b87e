// =============================================================================
// Static Plots
// =============================================================================
//
// Scatter and line charts rendered to standalone SVG documents, plus the
// builders for the standard regression pictures:
//
//   fit_plot               data with the fitted line over the predictor range
//   residuals_vs_fitted    non-linearity, unequal variance
//   normal_qq              normality of the standardized residuals
//   scale_location         sqrt(|std. residual|) against fitted values
//   residuals_vs_leverage  influential points, with Cook's distance contours
//
// Non-finite coordinates are skipped when rendering. A plot with nothing
// finite to draw is an error.
//
// =============================================================================

mod svg;

use ndarray::Array1;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::data::DataFrame;
use crate::diagnostics::quantile;
use crate::error::{Result, RustyLmError};
use crate::formula::VariableKind;
use crate::models::{GlmFit, Interval, LmFit};
use crate::simulate::linspace;

/// Number of grid points used to draw fitted curves.
const CURVE_POINTS: usize = 101;

/// Cook's distance levels drawn on the leverage plot.
const COOK_LEVELS: [f64; 2] = [0.5, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Points,
    Line,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub kind: SeriesKind,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Series {
    fn finite_points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(&x, &y)| (x, y))
    }
}

/// A two-dimensional chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
    /// Horizontal reference lines across the full width.
    pub hlines: Vec<f64>,
}

impl Plot {
    pub fn new(title: &str, x_label: &str, y_label: &str) -> Self {
        Self {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            series: Vec::new(),
            hlines: Vec::new(),
        }
    }

    pub fn with_points(self, name: &str, x: Vec<f64>, y: Vec<f64>) -> Self {
        self.with_series(name, SeriesKind::Points, x, y)
    }

    pub fn with_line(self, name: &str, x: Vec<f64>, y: Vec<f64>) -> Self {
        self.with_series(name, SeriesKind::Line, x, y)
    }

    pub fn with_hline(mut self, y: f64) -> Self {
        self.hlines.push(y);
        self
    }

    fn with_series(mut self, name: &str, kind: SeriesKind, x: Vec<f64>, y: Vec<f64>) -> Self {
        self.series.push(Series {
            name: name.to_string(),
            kind,
            x,
            y,
        });
        self
    }

    /// Number of drawable (finite) points across all series.
    pub fn n_finite_points(&self) -> usize {
        self.series.iter().map(|s| s.finite_points().count()).sum()
    }

    /// Render as an SVG document of the given pixel size.
    pub fn to_svg(&self, width: u32, height: u32) -> Result<String> {
        if width < 100 || height < 100 {
            return Err(RustyLmError::InvalidValue(format!(
                "plot size must be at least 100x100, got {}x{}",
                width, height
            )));
        }
        if self.n_finite_points() == 0 {
            return Err(RustyLmError::EmptyInput(format!(
                "plot '{}' has no finite points",
                self.title
            )));
        }
        Ok(svg::render(self, width as f64, height as f64))
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Scatter of `predictor` against the response with the fitted line.
///
/// Only models whose terms all involve the single numeric `predictor`
/// (e.g. `y ~ x` or `y ~ x + I(x^2)`) can be drawn this way.
pub fn fit_plot(fit: &LmFit, data: &DataFrame, predictor: &str) -> Result<Plot> {
    let formula = fit.formula();
    for term in &formula.terms {
        for var in &term.variables {
            if var.name != predictor || var.kind == VariableKind::Categorical {
                return Err(RustyLmError::InvalidValue(format!(
                    "fit plot needs a model in the single numeric predictor '{}', found term '{}'",
                    predictor,
                    term.label()
                )));
            }
        }
    }

    let x = fit.design().select_rows(data, predictor)?;
    let (low, high) = finite_range(x.iter().copied()).ok_or_else(|| {
        RustyLmError::EmptyInput(format!("predictor '{}' has no finite values", predictor))
    })?;

    let grid = linspace(low, high, CURVE_POINTS);
    let grid_data = DataFrame::new().with_numeric(predictor, grid.clone())?;
    let curve = fit.predict(&grid_data, Interval::None, fit.conf_level())?;

    Ok(Plot::new(
        &format!("lm({})", formula.text),
        predictor,
        &formula.response,
    )
    .with_points("observed", x.to_vec(), fit.response().to_vec())
    .with_line("fitted", grid, curve.fit.to_vec()))
}

/// The per-observation quantities the diagnostic plots need.
pub trait DiagnosticSource {
    /// Horizontal axis of the residual plots (linear predictor for GLMs).
    fn plot_fitted(&self) -> Array1<f64>;
    /// Raw residuals for linear models, deviance residuals for GLMs.
    fn plot_residuals(&self) -> Array1<f64>;
    fn plot_standardized_residuals(&self) -> Array1<f64>;
    fn plot_leverage(&self) -> Array1<f64>;
    fn plot_n_params(&self) -> usize;
}

impl DiagnosticSource for LmFit {
    fn plot_fitted(&self) -> Array1<f64> {
        self.fitted_values().clone()
    }

    fn plot_residuals(&self) -> Array1<f64> {
        self.residuals().clone()
    }

    fn plot_standardized_residuals(&self) -> Array1<f64> {
        self.standardized_residuals()
    }

    fn plot_leverage(&self) -> Array1<f64> {
        self.hat_values().clone()
    }

    fn plot_n_params(&self) -> usize {
        self.n_params()
    }
}

impl DiagnosticSource for GlmFit {
    fn plot_fitted(&self) -> Array1<f64> {
        self.linear_predictor().clone()
    }

    fn plot_residuals(&self) -> Array1<f64> {
        self.deviance_residuals()
    }

    fn plot_standardized_residuals(&self) -> Array1<f64> {
        self.standardized_residuals()
    }

    fn plot_leverage(&self) -> Array1<f64> {
        self.hat_values().clone()
    }

    fn plot_n_params(&self) -> usize {
        self.n_params()
    }
}

pub fn residuals_vs_fitted<M: DiagnosticSource + ?Sized>(fit: &M) -> Plot {
    Plot::new("Residuals vs Fitted", "Fitted values", "Residuals")
        .with_points("", fit.plot_fitted().to_vec(), fit.plot_residuals().to_vec())
        .with_hline(0.0)
}

/// Plotting positions (i - a) / (n + 1 - 2a), a = 3/8 for n <= 10 else 1/2.
pub fn ppoints(n: usize) -> Vec<f64> {
    let a = if n <= 10 { 3.0 / 8.0 } else { 0.5 };
    (1..=n)
        .map(|i| (i as f64 - a) / (n as f64 + 1.0 - 2.0 * a))
        .collect()
}

/// Sorted standardized residuals against Normal quantiles, with the line
/// through the first and third quartiles.
pub fn normal_qq<M: DiagnosticSource + ?Sized>(fit: &M) -> Result<Plot> {
    let mut sample: Vec<f64> = fit
        .plot_standardized_residuals()
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if sample.is_empty() {
        return Err(RustyLmError::EmptyInput(
            "no finite standardized residuals".to_string(),
        ));
    }
    sample.sort_by(|a, b| a.total_cmp(b));

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| RustyLmError::InvalidValue(format!("standard normal: {}", e)))?;
    let theoretical: Vec<f64> = ppoints(sample.len())
        .into_iter()
        .map(|p| normal.inverse_cdf(p))
        .collect();

    let mut plot = Plot::new("Normal Q-Q", "Theoretical Quantiles", "Std. residuals")
        .with_points("", theoretical.clone(), sample.clone());

    // qqline: through the sample and theoretical quartiles
    let (q1, q3) = (quantile(&sample, 0.25), quantile(&sample, 0.75));
    let (z1, z3) = (normal.inverse_cdf(0.25), normal.inverse_cdf(0.75));
    let slope = (q3 - q1) / (z3 - z1);
    let intercept = q1 - slope * z1;
    if let (Some(&lo), Some(&hi)) = (theoretical.first(), theoretical.last()) {
        plot = plot.with_line(
            "",
            vec![lo, hi],
            vec![intercept + slope * lo, intercept + slope * hi],
        );
    }
    Ok(plot)
}

pub fn scale_location<M: DiagnosticSource + ?Sized>(fit: &M) -> Plot {
    let root_abs = fit.plot_standardized_residuals().mapv(|r| r.abs().sqrt());
    Plot::new("Scale-Location", "Fitted values", "sqrt(|Std. residuals|)")
        .with_points("", fit.plot_fitted().to_vec(), root_abs.to_vec())
}

/// Standardized residuals against leverage, with the contours where Cook's
/// distance equals 0.5 and 1.
pub fn residuals_vs_leverage<M: DiagnosticSource + ?Sized>(fit: &M) -> Plot {
    let leverage = fit.plot_leverage();
    let mut plot = Plot::new("Residuals vs Leverage", "Leverage", "Std. residuals")
        .with_points(
            "",
            leverage.to_vec(),
            fit.plot_standardized_residuals().to_vec(),
        )
        .with_hline(0.0);

    let p = fit.plot_n_params() as f64;
    let max_h = leverage
        .iter()
        .copied()
        .filter(|h| h.is_finite() && *h < 1.0)
        .fold(0.0_f64, f64::max);
    if max_h > 0.0 {
        let hs: Vec<f64> = linspace(max_h / CURVE_POINTS as f64, max_h, CURVE_POINTS);
        for level in COOK_LEVELS {
            let upper: Vec<f64> = hs
                .iter()
                .map(|h| (level * p * (1.0 - h) / h).sqrt())
                .collect();
            let lower: Vec<f64> = upper.iter().map(|r| -r).collect();
            let name = format!("Cook's distance {}", level);
            plot = plot
                .with_line(&name, hs.clone(), upper)
                .with_line("", hs.clone(), lower);
        }
    }
    plot
}

/// The four standard diagnostic plots in R's order.
pub fn diagnostic_plots<M: DiagnosticSource + ?Sized>(fit: &M) -> Result<Vec<Plot>> {
    Ok(vec![
        residuals_vs_fitted(fit),
        normal_qq(fit)?,
        scale_location(fit),
        residuals_vs_leverage(fit),
    ])
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeneralizedLinearModel, GlmOptions, LinearModel, LmOptions};
    use approx::assert_abs_diff_eq;

    fn data() -> DataFrame {
        DataFrame::new()
            .with_numeric("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .unwrap()
            .with_numeric("y", vec![1.2, 1.9, 3.4, 3.9, 5.3, 5.8, 7.4, 7.7])
            .unwrap()
            .with_factor("g", &["a", "b", "a", "b", "a", "b", "a", "b"])
            .unwrap()
    }

    #[test]
    fn test_ppoints_small_and_large() {
        let p = ppoints(5);
        assert_abs_diff_eq!(p[0], (1.0 - 0.375) / 5.25, epsilon = 1e-12);
        assert_abs_diff_eq!(p[2], 0.5, epsilon = 1e-12);
        let q = ppoints(20);
        assert_abs_diff_eq!(q[0], 0.5 / 20.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_plot_curve_follows_coefficients() {
        let d = data();
        let fit = LinearModel::fit("y ~ x", &d, &LmOptions::default()).unwrap();
        let plot = fit_plot(&fit, &d, "x").unwrap();
        assert_eq!(plot.series.len(), 2);
        let line = &plot.series[1];
        assert_eq!(line.kind, SeriesKind::Line);
        assert_abs_diff_eq!(line.x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(line.x[CURVE_POINTS - 1], 8.0, epsilon = 1e-12);
        let b = fit.coefficients();
        assert_abs_diff_eq!(line.y[0], b[0] + b[1], epsilon = 1e-10);
    }

    #[test]
    fn test_fit_plot_rejects_factor_models() {
        let d = data();
        let fit = LinearModel::fit("y ~ x + g", &d, &LmOptions::default()).unwrap();
        assert!(fit_plot(&fit, &d, "x").is_err());
    }

    #[test]
    fn test_qq_plot_is_sorted() {
        let fit = LinearModel::fit("y ~ x", &data(), &LmOptions::default()).unwrap();
        let plot = normal_qq(&fit).unwrap();
        let ys = &plot.series[0].y;
        assert!(ys.windows(2).all(|w| w[0] <= w[1]));
        let xs = &plot.series[0].x;
        assert_abs_diff_eq!(xs[0], -xs[xs.len() - 1], epsilon = 1e-12);
    }

    #[test]
    fn test_diagnostic_plots_for_glm() {
        let fit = GeneralizedLinearModel::fit(
            "y ~ x",
            &data(),
            &GlmOptions {
                family: "poisson".to_string(),
                ..GlmOptions::default()
            },
        )
        .unwrap();
        let plots = diagnostic_plots(&fit).unwrap();
        let titles: Vec<&str> = plots.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Residuals vs Fitted", "Normal Q-Q", "Scale-Location", "Residuals vs Leverage"]
        );
        for p in &plots {
            assert!(p.to_svg(480, 360).is_ok());
        }
    }

    #[test]
    fn test_empty_plot_is_an_error() {
        let plot = Plot::new("empty", "x", "y").with_points("", vec![f64::NAN], vec![1.0]);
        assert!(matches!(plot.to_svg(400, 300), Err(RustyLmError::EmptyInput(_))));
    }

    #[test]
    fn test_svg_skips_non_finite_points() {
        let plot = Plot::new("t", "x", "y").with_points(
            "",
            vec![0.0, 1.0, f64::INFINITY, 2.0],
            vec![0.0, 1.0, 5.0, f64::NAN],
        );
        let svg = plot.to_svg(400, 300).unwrap();
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<circle").count(), 2);
    }
}
