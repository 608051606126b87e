// =============================================================================
// Design Matrix Construction
// =============================================================================
//
// Turns a parsed formula plus a data frame into the numeric matrix X that the
// solvers work with.
//
// CODING RULES (the same ones R's model.matrix uses):
//
//   - Intercept:  a column of ones named "(Intercept)", always first.
//   - Numeric:    the column itself ("x"), or its power ("I(x^2)").
//   - Factor:     indicator columns named label + level ("groupB").
//                 If the model already contains the term's MARGIN (the same
//                 term with this factor removed; the intercept is the margin
//                 of a main effect) the factor is coded with treatment
//                 contrasts: the first level is the baseline and gets no
//                 column. Otherwise every level gets a column.
//   - Interaction: products of the constituent columns, names joined by ':'.
//                 The first variable varies fastest.
//
// So `y ~ x * group` with levels A, B, C produces
//
//     (Intercept)  x  groupB  groupC  x:groupB  x:groupC
//
// while `y ~ 0 + group` produces the cell-means coding groupA groupB groupC.
//
// MISSING DATA:
//   Rows with a missing value in any variable the model uses (or in any
//   auxiliary column such as weights) are dropped before building X.
//
// =============================================================================

use std::collections::{BTreeMap, HashSet};

use ndarray::{Array1, Array2};
use tracing::warn;

use crate::data::{Column, DataFrame};
use crate::error::{Result, RustyLmError};
use crate::formula::{ParsedFormula, Term, TermVariable, VariableKind};

/// The numeric representation of a model for a specific data set.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// n × p model matrix.
    pub x: Array2<f64>,
    /// Response vector; `None` when building for prediction without a response.
    pub y: Option<Array1<f64>>,
    /// Column names, e.g. "(Intercept)", "x", "groupB", "x:groupB".
    pub column_names: Vec<String>,
    /// Term labels in formula order (excluding the intercept).
    pub term_labels: Vec<String>,
    /// For each column, the index of the term it belongs to (`None` = intercept).
    pub assign: Vec<Option<usize>>,
    pub has_intercept: bool,
    /// Levels of every factor variable, keyed by column name.
    pub factor_levels: BTreeMap<String, Vec<String>>,
    /// Indices (into the original data frame) of the rows kept.
    pub rows: Vec<usize>,
    /// Number of rows dropped for missing values.
    pub n_dropped: usize,
}

impl DesignMatrix {
    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_params(&self) -> usize {
        self.x.ncols()
    }

    /// The response, or an error if this matrix was built without one.
    pub fn response(&self) -> Result<&Array1<f64>> {
        self.y.as_ref().ok_or_else(|| {
            RustyLmError::EmptyInput("design matrix was built without a response".to_string())
        })
    }

    /// Extract a numeric column of the original data restricted to the kept rows.
    pub fn select_rows(&self, data: &DataFrame, column: &str) -> Result<Array1<f64>> {
        let values = data.numeric(column)?;
        Ok(self.rows.iter().map(|&i| values[i]).collect())
    }

    /// Build the matrix for new data using this model's factor levels.
    ///
    /// The response column may be absent; unseen factor levels are an error.
    pub fn for_new_data(&self, formula: &ParsedFormula, data: &DataFrame) -> Result<DesignMatrix> {
        build(formula, data, Some(&self.factor_levels), false, &[])
    }
}

/// Build the design matrix and response for fitting.
pub fn build_design_matrix(formula: &ParsedFormula, data: &DataFrame) -> Result<DesignMatrix> {
    build(formula, data, None, true, &[])
}

/// Like [`build_design_matrix`], but rows with missing values in any of the
/// auxiliary columns (weights, offset) are dropped too.
pub fn build_design_matrix_with_aux(
    formula: &ParsedFormula,
    data: &DataFrame,
    aux_columns: &[&str],
) -> Result<DesignMatrix> {
    build(formula, data, None, true, aux_columns)
}

// =============================================================================
// Variable resolution
// =============================================================================

enum Resolved {
    Numeric(Vec<f64>),
    Factor {
        levels: Vec<String>,
        codes: Vec<Option<usize>>,
    },
}

impl Resolved {
    fn is_missing(&self, i: usize) -> bool {
        match self {
            Resolved::Numeric(v) => !v[i].is_finite(),
            Resolved::Factor { codes, .. } => codes[i].is_none(),
        }
    }
}

/// Re-code a factor onto a known level set.
fn recode(
    name: &str,
    levels: &[String],
    codes: &[Option<usize>],
    known: &[String],
) -> Result<Vec<Option<usize>>> {
    codes
        .iter()
        .map(|c| match c {
            None => Ok(None),
            Some(idx) => known
                .iter()
                .position(|k| *k == levels[*idx])
                .map(Some)
                .ok_or_else(|| RustyLmError::UnknownLevel {
                    factor: name.to_string(),
                    level: levels[*idx].clone(),
                }),
        })
        .collect()
}

fn resolve_variable(
    var: &TermVariable,
    data: &DataFrame,
    known_levels: Option<&BTreeMap<String, Vec<String>>>,
) -> Result<Resolved> {
    let column = data.column(&var.name)?;

    let (levels, codes) = match (&var.kind, column) {
        (VariableKind::Power(_), Column::Factor { .. }) => {
            return Err(RustyLmError::InvalidValue(format!(
                "cannot take a power of categorical variable '{}'",
                var.name
            )))
        }
        (VariableKind::Power(k), Column::Numeric(values)) => {
            return Ok(Resolved::Numeric(values.iter().map(|v| v.powi(*k)).collect()))
        }
        (VariableKind::Auto, Column::Numeric(values)) => {
            return Ok(Resolved::Numeric(values.clone()))
        }
        (VariableKind::Auto, Column::Factor { .. }) | (VariableKind::Categorical, _) => {
            column.factor_parts()
        }
    };

    match known_levels.and_then(|k| k.get(&var.name)) {
        Some(known) => Ok(Resolved::Factor {
            codes: recode(&var.name, &levels, &codes, known)?,
            levels: known.clone(),
        }),
        None => Ok(Resolved::Factor { levels, codes }),
    }
}

// =============================================================================
// Term expansion
// =============================================================================

/// One candidate column: its name and how to compute its value for a row.
struct ColumnSpec {
    name: String,
    /// (variable label, Some(level) for an indicator / None for numeric value)
    parts: Vec<(String, Option<usize>)>,
}

fn term_key(labels: impl Iterator<Item = String>) -> Vec<String> {
    let mut v: Vec<String> = labels.collect();
    v.sort();
    v
}

/// Expand a term into column specs.
fn expand_term(
    term: &Term,
    resolved: &BTreeMap<String, Resolved>,
    present_terms: &HashSet<Vec<String>>,
) -> Vec<ColumnSpec> {
    let mut specs = vec![ColumnSpec {
        name: String::new(),
        parts: Vec::new(),
    }];

    // Build the cartesian product with the first variable varying fastest:
    // iterate variables in order, and for each new variable, repeat the existing
    // combinations once per choice of the new variable.
    for var in &term.variables {
        let choices: Vec<(String, Option<usize>)> = match &resolved[&var.label] {
            Resolved::Numeric(_) => vec![(var.label.clone(), None)],
            Resolved::Factor { levels, .. } => {
                let margin = term_key(
                    term.variables
                        .iter()
                        .filter(|v| v.label != var.label)
                        .map(|v| v.label.clone()),
                );
                let use_contrasts = present_terms.contains(&margin);
                let start = usize::from(use_contrasts);
                (start..levels.len())
                    .map(|lv| (format!("{}{}", var.label, levels[lv]), Some(lv)))
                    .collect()
            }
        };

        let mut next = Vec::with_capacity(specs.len() * choices.len());
        for (choice_name, level) in &choices {
            for spec in &specs {
                let name = if spec.name.is_empty() {
                    choice_name.clone()
                } else {
                    format!("{}:{}", spec.name, choice_name)
                };
                let mut parts = spec.parts.clone();
                parts.push((var.label.clone(), *level));
                next.push(ColumnSpec { name, parts });
            }
        }
        specs = next;
    }

    specs
}

fn cell_value(resolved: &Resolved, level: Option<usize>, row: usize) -> f64 {
    match (resolved, level) {
        (Resolved::Numeric(v), _) => v[row],
        (Resolved::Factor { codes, .. }, Some(lv)) => {
            if codes[row] == Some(lv) {
                1.0
            } else {
                0.0
            }
        }
        (Resolved::Factor { .. }, None) => f64::NAN,
    }
}

// =============================================================================
// Builder
// =============================================================================

fn build(
    formula: &ParsedFormula,
    data: &DataFrame,
    known_levels: Option<&BTreeMap<String, Vec<String>>>,
    require_response: bool,
    aux_columns: &[&str],
) -> Result<DesignMatrix> {
    let n_rows = data.n_rows();
    if n_rows == 0 {
        return Err(RustyLmError::EmptyInput("data frame has no rows".to_string()));
    }

    // Resolve every variable once, keyed by its formula label
    let mut resolved: BTreeMap<String, Resolved> = BTreeMap::new();
    for term in &formula.terms {
        for var in &term.variables {
            if !resolved.contains_key(&var.label) {
                resolved.insert(var.label.clone(), resolve_variable(var, data, known_levels)?);
            }
        }
    }

    // Response
    let response: Option<&[f64]> = if require_response || data.has_column(&formula.response) {
        Some(data.numeric(&formula.response)?)
    } else {
        None
    };

    let aux: Vec<&[f64]> = aux_columns
        .iter()
        .map(|c| data.numeric(c))
        .collect::<Result<_>>()?;

    // Complete cases
    let rows: Vec<usize> = (0..n_rows)
        .filter(|&i| {
            response.map_or(true, |y| y[i].is_finite())
                && aux.iter().all(|a| a[i].is_finite())
                && resolved.values().all(|r| !r.is_missing(i))
        })
        .collect();

    let n_dropped = n_rows - rows.len();
    if rows.is_empty() {
        return Err(RustyLmError::EmptyInput(
            "no complete rows remain after dropping missing values".to_string(),
        ));
    }
    if n_dropped > 0 {
        warn!(n_dropped, "dropped rows with missing values");
    }

    // Column layout
    let mut present_terms: HashSet<Vec<String>> = formula
        .terms
        .iter()
        .map(|t| term_key(t.variables.iter().map(|v| v.label.clone())))
        .collect();
    if formula.has_intercept {
        present_terms.insert(Vec::new());
    }

    let mut column_names = Vec::new();
    let mut assign = Vec::new();
    let mut specs: Vec<ColumnSpec> = Vec::new();

    if formula.has_intercept {
        column_names.push("(Intercept)".to_string());
        assign.push(None);
    }
    for (t, term) in formula.terms.iter().enumerate() {
        for spec in expand_term(term, &resolved, &present_terms) {
            column_names.push(spec.name.clone());
            assign.push(Some(t));
            specs.push(spec);
        }
    }

    if column_names.is_empty() {
        return Err(RustyLmError::EmptyInput(
            "model has no intercept and no terms".to_string(),
        ));
    }

    // Fill X
    let offset = usize::from(formula.has_intercept);
    let mut x = Array2::zeros((rows.len(), column_names.len()));
    for (r, &i) in rows.iter().enumerate() {
        if formula.has_intercept {
            x[[r, 0]] = 1.0;
        }
        for (j, spec) in specs.iter().enumerate() {
            x[[r, j + offset]] = spec
                .parts
                .iter()
                .map(|(label, level)| cell_value(&resolved[label], *level, i))
                .product();
        }
    }

    let y = response.map(|y| rows.iter().map(|&i| y[i]).collect::<Array1<f64>>());

    let mut factor_levels = known_levels.cloned().unwrap_or_default();
    for term in &formula.terms {
        for var in &term.variables {
            if let Resolved::Factor { levels, .. } = &resolved[&var.label] {
                factor_levels.entry(var.name.clone()).or_insert_with(|| levels.clone());
            }
        }
    }

    Ok(DesignMatrix {
        x,
        y,
        column_names,
        term_labels: formula.term_labels(),
        assign,
        has_intercept: formula.has_intercept,
        factor_levels,
        rows,
        n_dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parse_formula;
    use ndarray::array;

    fn grouped_data() -> DataFrame {
        DataFrame::new()
            .with_numeric("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .with_factor("group", &["a", "b", "c", "a", "b", "c"])
            .unwrap()
            .with_numeric("y", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
    }

    #[test]
    fn test_simple_regression_matrix() {
        let df = grouped_data();
        let dm = build_design_matrix(&parse_formula("y ~ x").unwrap(), &df).unwrap();
        assert_eq!(dm.column_names, vec!["(Intercept)", "x"]);
        assert_eq!(dm.x.column(0), Array1::<f64>::ones(6));
        assert_eq!(dm.x.column(1), array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(dm.assign, vec![None, Some(0)]);
    }

    #[test]
    fn test_treatment_contrasts() {
        let df = grouped_data();
        let dm = build_design_matrix(&parse_formula("y ~ group").unwrap(), &df).unwrap();
        assert_eq!(dm.column_names, vec!["(Intercept)", "groupb", "groupc"]);
        assert_eq!(dm.x.column(1), array![0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_cell_means_without_intercept() {
        let df = grouped_data();
        let dm = build_design_matrix(&parse_formula("y ~ 0 + group").unwrap(), &df).unwrap();
        assert_eq!(dm.column_names, vec!["groupa", "groupb", "groupc"]);
    }

    #[test]
    fn test_ancova_interaction_columns() {
        let df = grouped_data();
        let dm = build_design_matrix(&parse_formula("y ~ x * group").unwrap(), &df).unwrap();
        assert_eq!(
            dm.column_names,
            vec!["(Intercept)", "x", "groupb", "groupc", "x:groupb", "x:groupc"]
        );
        assert_eq!(dm.x.column(4), array![0.0, 2.0, 0.0, 0.0, 5.0, 0.0]);
        assert_eq!(dm.assign[4], Some(2));
        assert_eq!(dm.term_labels, vec!["x", "group", "x:group"]);
    }

    #[test]
    fn test_separate_slopes_without_margin() {
        let df = grouped_data();
        let dm = build_design_matrix(&parse_formula("y ~ group + x:group").unwrap(), &df).unwrap();
        assert_eq!(
            dm.column_names,
            vec!["(Intercept)", "groupb", "groupc", "x:groupa", "x:groupb", "x:groupc"]
        );
    }

    #[test]
    fn test_forced_categorical_and_power() {
        let df = DataFrame::new()
            .with_numeric("dose", vec![1.0, 2.0, 1.0, 2.0])
            .unwrap()
            .with_numeric("y", vec![0.0, 1.0, 2.0, 3.0])
            .unwrap();
        let dm = build_design_matrix(&parse_formula("y ~ C(dose) + I(dose^2)").unwrap(), &df)
            .unwrap();
        assert_eq!(dm.column_names, vec!["(Intercept)", "C(dose)2", "I(dose^2)"]);
        assert_eq!(dm.x.column(2), array![1.0, 4.0, 1.0, 4.0]);
    }

    #[test]
    fn test_missing_rows_dropped() {
        let df = DataFrame::new()
            .with_numeric("x", vec![1.0, f64::NAN, 3.0])
            .unwrap()
            .with_numeric("y", vec![1.0, 2.0, f64::NAN])
            .unwrap();
        let dm = build_design_matrix(&parse_formula("y ~ x").unwrap(), &df).unwrap();
        assert_eq!(dm.rows, vec![0]);
        assert_eq!(dm.n_dropped, 2);
    }

    #[test]
    fn test_new_data_uses_training_levels() {
        let df = grouped_data();
        let formula = parse_formula("y ~ group").unwrap();
        let dm = build_design_matrix(&formula, &df).unwrap();

        let new = DataFrame::new().with_factor("group", &["c"]).unwrap();
        let nd = dm.for_new_data(&formula, &new).unwrap();
        assert!(nd.y.is_none());
        assert_eq!(nd.x.row(0), array![1.0, 0.0, 1.0]);

        let unseen = DataFrame::new().with_factor("group", &["z"]).unwrap();
        assert!(matches!(
            dm.for_new_data(&formula, &unseen),
            Err(RustyLmError::UnknownLevel { .. })
        ));
    }

    #[test]
    fn test_missing_response_column_is_error_when_fitting() {
        let df = DataFrame::new().with_numeric("x", vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            build_design_matrix(&parse_formula("y ~ x").unwrap(), &df),
            Err(RustyLmError::UnknownColumn(_))
        ));
    }
}
