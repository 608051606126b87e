// =============================================================================
// Deterministic and Stochastic Response Models
// =============================================================================
//
// A DETERMINISTIC model maps each input to exactly one output:
//
//     y = a + b·x
//
// Run it twice with the same x and you get the same y.
//
// A STOCHASTIC model says y is a random variable whose distribution depends
// on x. The classic linear model puts the randomness in an additive error:
//
//     y = a + b·x + ε,    ε ~ N(0, σ²)
//
// but the same mean structure can sit inside any exponential dispersion
// model: counts around exp(a + b·x), positive skewed amounts with a gamma
// distribution, and so on. The systematic part (the line) is what regression
// estimates; the random part is what makes estimation uncertain.
//
// Every generator here takes an explicit seed so examples are reproducible.
//
// =============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma, Normal, Poisson, Uniform};
use serde::{Deserialize, Serialize};

use crate::data::{Column, DataFrame};
use crate::error::{Result, RustyLmError};

/// The systematic part: intercept + slope · x.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub intercept: f64,
    pub slope: f64,
}

impl Line {
    pub fn new(intercept: f64, slope: f64) -> Self {
        Self { intercept, slope }
    }

    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// A rule that turns a predictor value into a response value.
pub trait ResponseModel: Send + Sync {
    /// Short human-readable description.
    fn name(&self) -> &str;

    /// E[y | x].
    fn mean(&self, x: f64) -> f64;

    /// Draw one response for predictor value `x`.
    fn sample(&self, x: f64, rng: &mut StdRng) -> f64;
}

// =============================================================================
// Deterministic
// =============================================================================

/// y = a + b·x exactly. Sampling always returns the mean.
#[derive(Debug, Clone, Copy)]
pub struct Deterministic(pub Line);

impl ResponseModel for Deterministic {
    fn name(&self) -> &str {
        "deterministic"
    }

    fn mean(&self, x: f64) -> f64 {
        self.0.eval(x)
    }

    fn sample(&self, x: f64, _rng: &mut StdRng) -> f64 {
        self.0.eval(x)
    }
}

// =============================================================================
// Stochastic
// =============================================================================

/// y = a + b·x + ε with ε ~ N(0, σ²).
#[derive(Debug, Clone)]
pub struct NormalErrors {
    line: Line,
    sigma: f64,
    noise: Normal<f64>,
}

impl NormalErrors {
    pub fn new(line: Line, sigma: f64) -> Result<Self> {
        if !(sigma > 0.0 && sigma.is_finite()) {
            return Err(RustyLmError::InvalidValue(format!(
                "sigma must be positive, got {}",
                sigma
            )));
        }
        let noise = Normal::new(0.0, sigma)
            .map_err(|e| RustyLmError::InvalidValue(e.to_string()))?;
        Ok(Self { line, sigma, noise })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn line(&self) -> Line {
        self.line
    }
}

impl ResponseModel for NormalErrors {
    fn name(&self) -> &str {
        "normal"
    }

    fn mean(&self, x: f64) -> f64 {
        self.line.eval(x)
    }

    fn sample(&self, x: f64, rng: &mut StdRng) -> f64 {
        self.line.eval(x) + self.noise.sample(rng)
    }
}

/// y ~ Poisson(exp(a + b·x)): the line lives on the log scale.
#[derive(Debug, Clone, Copy)]
pub struct PoissonCounts {
    pub line: Line,
}

impl ResponseModel for PoissonCounts {
    fn name(&self) -> &str {
        "poisson"
    }

    fn mean(&self, x: f64) -> f64 {
        self.line.eval(x).exp()
    }

    fn sample(&self, x: f64, rng: &mut StdRng) -> f64 {
        let mu = self.mean(x);
        if !mu.is_finite() {
            return f64::NAN;
        }
        if mu == 0.0 {
            // exp underflow: the distribution is a point mass at zero
            return 0.0;
        }
        match Poisson::new(mu) {
            Ok(dist) => dist.sample(rng),
            Err(_) => f64::NAN,
        }
    }
}

/// y ~ Gamma with mean exp(a + b·x) and fixed shape (coefficient of
/// variation 1/√shape).
#[derive(Debug, Clone, Copy)]
pub struct GammaResponse {
    line: Line,
    shape: f64,
}

impl GammaResponse {
    pub fn new(line: Line, shape: f64) -> Result<Self> {
        if !(shape > 0.0 && shape.is_finite()) {
            return Err(RustyLmError::InvalidValue(format!(
                "gamma shape must be positive, got {}",
                shape
            )));
        }
        Ok(Self { line, shape })
    }
}

impl ResponseModel for GammaResponse {
    fn name(&self) -> &str {
        "gamma"
    }

    fn mean(&self, x: f64) -> f64 {
        self.line.eval(x).exp()
    }

    fn sample(&self, x: f64, rng: &mut StdRng) -> f64 {
        let mu = self.mean(x);
        if !mu.is_finite() {
            return f64::NAN;
        }
        match Gamma::new(self.shape, mu / self.shape) {
            Ok(dist) => dist.sample(rng),
            Err(_) => f64::NAN,
        }
    }
}

// =============================================================================
// Data Generation
// =============================================================================

/// Draw `n` predictor values uniformly from [low, high).
pub fn uniform_predictor(n: usize, low: f64, high: f64, rng: &mut StdRng) -> Result<Vec<f64>> {
    if !(low < high) || !(high - low).is_finite() {
        return Err(RustyLmError::InvalidValue(format!(
            "predictor range must be finite with low < high, got [{}, {})",
            low, high
        )));
    }
    let dist = Uniform::new(low, high);
    Ok((0..n).map(|_| dist.sample(rng)).collect())
}

/// Evenly spaced values from `low` to `high` inclusive.
pub fn linspace(low: f64, high: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![low],
        _ => {
            let step = (high - low) / (n - 1) as f64;
            (0..n).map(|i| low + step * i as f64).collect()
        }
    }
}

/// Generate a data frame with columns `x` and `y` from a response model.
pub fn simulate(model: &dyn ResponseModel, xs: &[f64], seed: u64) -> Result<DataFrame> {
    let mut rng = StdRng::seed_from_u64(seed);
    let ys: Vec<f64> = xs.iter().map(|&x| model.sample(x, &mut rng)).collect();

    DataFrame::new()
        .with_numeric("x", xs.to_vec())?
        .with_numeric("y", ys)
}

/// Generate ANCOVA-style data: a common slope, a per-group intercept shift,
/// and Normal errors.
///
/// `groups[i]` indexes into `group_shifts`; the factor column `group` uses
/// labels "A", "B", "C", ...
pub fn simulate_grouped(
    model: &NormalErrors,
    xs: &[f64],
    groups: &[usize],
    group_shifts: &[f64],
    seed: u64,
) -> Result<DataFrame> {
    if xs.len() != groups.len() {
        return Err(RustyLmError::DimensionMismatch(format!(
            "{} predictor values but {} group assignments",
            xs.len(),
            groups.len()
        )));
    }
    if let Some(&bad) = groups.iter().find(|&&g| g >= group_shifts.len()) {
        return Err(RustyLmError::InvalidValue(format!(
            "group index {} but only {} group shifts",
            bad,
            group_shifts.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let ys: Vec<f64> = xs
        .iter()
        .zip(groups)
        .map(|(&x, &g)| model.sample(x, &mut rng) + group_shifts[g])
        .collect();

    let labels: Vec<Option<String>> = groups.iter().map(|&g| Some(group_label(g))).collect();

    DataFrame::new()
        .with_numeric("x", xs.to_vec())?
        .with_column("group", Column::factor_from_labels(&labels))?
        .with_numeric("y", ys)
}

/// Assign `n` observations to `k` groups in round-robin order.
pub fn balanced_groups(n: usize, k: usize) -> Vec<usize> {
    (0..n).map(|i| i % k.max(1)).collect()
}

/// Random group assignment, for when balance is not wanted.
pub fn random_groups(n: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    (0..n).map(|_| rng.gen_range(0..k.max(1))).collect()
}

fn group_label(g: usize) -> String {
    let mut label = String::new();
    let mut g = g;
    loop {
        label.insert(0, (b'A' + (g % 26) as u8) as char);
        if g < 26 {
            break;
        }
        g = g / 26 - 1;
    }
    label
}
