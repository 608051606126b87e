// =============================================================================
// Data Frames
// =============================================================================
//
// A deliberately small column store: enough to hold the kind of example data
// regression is taught with (a predictor, a response, maybe a grouping
// factor) and to hand variables to the design-matrix builder by name.
//
// Missing values:
//   - numeric columns use NaN
//   - factor columns use a `None` code
//
// Factor levels are kept sorted, so the first level is the baseline for
// treatment contrasts.
//
// =============================================================================

mod io;

use std::collections::BTreeSet;

use crate::error::{Result, RustyLmError};

/// A single named column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Continuous values; NaN marks a missing cell.
    Numeric(Vec<f64>),
    /// Categorical values stored as codes into a sorted level list.
    Factor {
        levels: Vec<String>,
        codes: Vec<Option<usize>>,
    },
}

impl Column {
    /// Build a factor from string labels. Levels are the distinct labels, sorted.
    pub fn factor_from_labels<S: AsRef<str>>(labels: &[Option<S>]) -> Self {
        let levels: Vec<String> = labels
            .iter()
            .flatten()
            .map(|s| s.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let codes = labels
            .iter()
            .map(|l| {
                l.as_ref()
                    .and_then(|s| levels.iter().position(|lv| lv == s.as_ref()))
            })
            .collect();

        Column::Factor { levels, codes }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Factor { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_factor(&self) -> bool {
        matches!(self, Column::Factor { .. })
    }

    /// Whether row `i` is missing.
    pub fn is_missing(&self, i: usize) -> bool {
        match self {
            Column::Numeric(v) => !v[i].is_finite(),
            Column::Factor { codes, .. } => codes[i].is_none(),
        }
    }

    /// Treat this column as categorical.
    ///
    /// Numeric columns become factors whose levels are the distinct values
    /// sorted numerically (so "2" sorts before "10").
    pub fn as_factor(&self) -> Column {
        let (levels, codes) = self.factor_parts();
        Column::Factor { levels, codes }
    }

    /// Levels and per-row codes of this column viewed as a factor.
    pub fn factor_parts(&self) -> (Vec<String>, Vec<Option<usize>>) {
        match self {
            Column::Factor { levels, codes } => (levels.clone(), codes.clone()),
            Column::Numeric(values) => {
                let mut distinct: Vec<f64> =
                    values.iter().copied().filter(|v| v.is_finite()).collect();
                distinct.sort_by(|a, b| a.total_cmp(b));
                distinct.dedup();

                let levels = distinct.iter().map(|v| format!("{}", v)).collect();
                let codes = values
                    .iter()
                    .map(|v| {
                        if v.is_finite() {
                            distinct.iter().position(|d| d == v)
                        } else {
                            None
                        }
                    })
                    .collect();

                (levels, codes)
            }
        }
    }

    /// Render row `i` the way it is written to CSV.
    pub fn cell_string(&self, i: usize) -> String {
        match self {
            Column::Numeric(v) if v[i].is_finite() => format!("{}", v[i]),
            Column::Factor { levels, codes } => match codes[i] {
                Some(c) => levels[c].clone(),
                None => "NA".to_string(),
            },
            _ => "NA".to_string(),
        }
    }
}

/// Ordered collection of equally long, named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a column.
    ///
    /// Every other column fixes the row count the new one must match.
    pub fn with_column(mut self, name: &str, column: Column) -> Result<Self> {
        let expected_rows = self
            .names
            .iter()
            .zip(&self.columns)
            .find(|(n, _)| n.as_str() != name)
            .map(|(_, c)| c.len());

        if let Some(rows) = expected_rows {
            if rows != column.len() {
                return Err(RustyLmError::DimensionMismatch(format!(
                    "column '{}' has {} rows but the data frame has {}",
                    name,
                    column.len(),
                    rows
                )));
            }
        }

        match self.names.iter().position(|n| n == name) {
            Some(idx) => self.columns[idx] = column,
            None => {
                self.names.push(name.to_string());
                self.columns.push(column);
            }
        }
        Ok(self)
    }

    pub fn with_numeric(self, name: &str, values: Vec<f64>) -> Result<Self> {
        self.with_column(name, Column::Numeric(values))
    }

    pub fn with_factor<S: AsRef<str>>(self, name: &str, labels: &[S]) -> Result<Self> {
        let labels: Vec<Option<&str>> = labels.iter().map(|s| Some(s.as_ref())).collect();
        self.with_column(name, Column::factor_from_labels(&labels))
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| RustyLmError::UnknownColumn(name.to_string()))
    }

    /// Fetch a numeric column, rejecting factors.
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Numeric(v) => Ok(v),
            Column::Factor { .. } => Err(RustyLmError::InvalidValue(format!(
                "column '{}' is categorical but a numeric column is required",
                name
            ))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_levels_sorted() {
        let col = Column::factor_from_labels(&[Some("b"), Some("a"), None, Some("b")]);
        match col {
            Column::Factor { levels, codes } => {
                assert_eq!(levels, vec!["a", "b"]);
                assert_eq!(codes, vec![Some(1), Some(0), None, Some(1)]);
            }
            _ => panic!("expected factor"),
        }
    }

    #[test]
    fn test_numeric_as_factor_sorts_numerically() {
        let col = Column::Numeric(vec![10.0, 2.0, 2.0, f64::NAN]).as_factor();
        match col {
            Column::Factor { levels, codes } => {
                assert_eq!(levels, vec!["2", "10"]);
                assert_eq!(codes, vec![Some(1), Some(0), Some(0), None]);
            }
            _ => panic!("expected factor"),
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let df = DataFrame::new().with_numeric("x", vec![1.0, 2.0]).unwrap();
        let err = df.with_numeric("y", vec![1.0]).unwrap_err();
        assert!(matches!(err, RustyLmError::DimensionMismatch(_)));
    }

    #[test]
    fn test_replace_column() {
        let df = DataFrame::new()
            .with_numeric("x", vec![1.0, 2.0])
            .unwrap()
            .with_numeric("x", vec![3.0, 4.0])
            .unwrap();
        assert_eq!(df.n_cols(), 1);
        assert_eq!(df.numeric("x").unwrap(), &[3.0, 4.0]);
    }

    #[test]
    fn test_unknown_column() {
        let df = DataFrame::new().with_numeric("x", vec![1.0]).unwrap();
        assert!(matches!(
            df.column("y").unwrap_err(),
            RustyLmError::UnknownColumn(_)
        ));
    }

    #[test]
    fn test_numeric_rejects_factor() {
        let df = DataFrame::new().with_factor("g", &["a", "b"]).unwrap();
        assert!(df.numeric("g").is_err());
    }
}
