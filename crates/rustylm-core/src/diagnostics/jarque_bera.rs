//! Jarque-Bera test for normality of residuals.
//!
//! ```text
//! JB = n/6 · (S² + K²/4)
//! ```
//!
//! with S the sample skewness and K the excess kurtosis. Under normality JB is
//! asymptotically χ²(2).

use serde::Serialize;

use crate::error::{Result, RustyLmError};
use crate::inference::pvalue_chi2;

#[derive(Debug, Clone, Serialize)]
pub struct JarqueBeraResult {
    pub statistic: f64,
    pub p_value: f64,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    pub n: usize,
}

/// Jarque-Bera test; NaN values are ignored.
pub fn jarque_bera(data: &[f64]) -> Result<JarqueBeraResult> {
    let clean: Vec<f64> = data.iter().copied().filter(|x| !x.is_nan()).collect();
    let n = clean.len();

    if n < 3 {
        return Err(RustyLmError::EmptyInput(
            "Jarque-Bera test requires at least 3 observations".to_string(),
        ));
    }

    let mean = clean.iter().sum::<f64>() / n as f64;
    let (m2, m3, m4) = clean.iter().fold((0.0, 0.0, 0.0), |(m2, m3, m4), &x| {
        let d = x - mean;
        let d2 = d * d;
        (m2 + d2, m3 + d2 * d, m4 + d2 * d2)
    });
    let (m2, m3, m4) = (m2 / n as f64, m3 / n as f64, m4 / n as f64);

    if m2 <= 0.0 {
        return Err(RustyLmError::InvalidValue("data has zero variance".to_string()));
    }

    let skewness = m3 / m2.powf(1.5);
    let kurtosis = m4 / (m2 * m2) - 3.0;
    let statistic = (n as f64 / 6.0) * (skewness * skewness + kurtosis * kurtosis / 4.0);

    Ok(JarqueBeraResult {
        statistic,
        p_value: pvalue_chi2(statistic, 2.0),
        skewness,
        kurtosis,
        n,
    })
}
