//! Variance inflation factors.
//!
//! For each non-intercept column j, regress it on every other column of the
//! design and report VIF_j = 1 / (1 - R²_j). Rules of thumb: below 5 is fine,
//! above 10 signals serious collinearity.

use ndarray::{Array1, Array2, Axis};

use crate::design_matrix::DesignMatrix;
use crate::error::{Result, RustyLmError};
use crate::solvers::solve_least_squares;

/// VIF for every non-intercept column, keyed by column name.
pub fn compute_vif(design: &DesignMatrix) -> Result<Vec<(String, f64)>> {
    let columns: Vec<usize> = (0..design.n_params())
        .filter(|&j| design.assign[j].is_some())
        .collect();

    if columns.is_empty() {
        return Err(RustyLmError::InvalidValue(
            "VIF needs at least one predictor column".to_string(),
        ));
    }

    columns
        .iter()
        .map(|&j| {
            let name = design.column_names[j].clone();
            let others: Vec<usize> = (0..design.n_params()).filter(|&k| k != j).collect();
            if others.is_empty() {
                return Ok((name, 1.0));
            }

            let target: Array1<f64> = design.x.column(j).to_owned();
            let rest: Array2<f64> = design.x.select(Axis(1), &others);
            let solution = solve_least_squares(&rest, &target, None)?;

            let centre = if design.has_intercept {
                target.mean().unwrap_or(0.0)
            } else {
                0.0
            };
            let tss: f64 = target.iter().map(|v| (v - centre).powi(2)).sum();
            let r_squared = 1.0 - solution.rss / tss;

            let vif = if r_squared >= 1.0 {
                f64::INFINITY
            } else {
                1.0 / (1.0 - r_squared)
            };
            Ok((name, vif))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataFrame;
    use crate::design_matrix::build_design_matrix;
    use crate::formula::parse_formula;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_orthogonal_predictors_have_unit_vif() {
        let data = DataFrame::new()
            .with_numeric("a", vec![-1.0, 1.0, -1.0, 1.0])
            .unwrap()
            .with_numeric("b", vec![-1.0, -1.0, 1.0, 1.0])
            .unwrap()
            .with_numeric("y", vec![1.0, 2.0, 3.0, 5.0])
            .unwrap();
        let design = build_design_matrix(&parse_formula("y ~ a + b").unwrap(), &data).unwrap();
        let vif = compute_vif(&design).unwrap();
        assert_eq!(vif.len(), 2);
        assert_abs_diff_eq!(vif[0].1, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vif[1].1, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correlated_predictors_inflate() {
        let data = DataFrame::new()
            .with_numeric("a", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .with_numeric("b", vec![1.1, 2.0, 3.2, 3.9, 5.1, 6.0])
            .unwrap()
            .with_numeric("y", vec![1.0, 2.0, 3.0, 5.0, 4.0, 6.0])
            .unwrap();
        let design = build_design_matrix(&parse_formula("y ~ a + b").unwrap(), &data).unwrap();
        let vif = compute_vif(&design).unwrap();
        assert!(vif.iter().all(|(_, v)| *v > 10.0));
    }

    #[test]
    fn test_intercept_only_rejected() {
        let data = DataFrame::new().with_numeric("y", vec![1.0, 2.0]).unwrap();
        let design = build_design_matrix(&parse_formula("y ~ 1").unwrap(), &data).unwrap();
        assert!(compute_vif(&design).is_err());
    }
}
